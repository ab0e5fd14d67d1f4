//! Domain models and value objects

use serde::{Deserialize, Serialize};

/// Forum-assigned identifier of a created post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub i64);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of a forum on its hosting instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumId(pub i64);

impl std::fmt::Display for ForumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry fetched from a feed
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Canonical URL of the entry; the ledger key
    pub link: String,
    /// Entry title
    pub title: String,
    /// Full content, when the feed carries one
    pub content: Option<String>,
    /// Short summary, when the feed carries one
    pub summary: Option<String>,
    /// Category terms, in feed order
    pub categories: Vec<String>,
}

/// Which feed field becomes the post body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
    #[default]
    Full,
    Summary,
}

/// A category name mapped to a pin window in days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRule {
    pub category: String,
    pub days: i64,
}

/// Static definition of one polled feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSpec {
    /// Name referenced by forum mappings
    pub name: String,
    /// Feed document URL
    pub url: String,
    /// Category rules granting a pin window
    #[serde(default)]
    pub pin_rules: Vec<PinRule>,
    /// Body field selection
    #[serde(default)]
    pub content: ContentField,
}

impl FeedSpec {
    /// Pin window for an item, in whole days.
    ///
    /// Categories are scanned in the item's own order and the last one with
    /// a matching rule wins, so a later category overrides an earlier one.
    pub fn pin_days_for(&self, categories: &[String]) -> i64 {
        let mut days = 0;
        for category in categories {
            if let Some(rule) = self.pin_rules.iter().find(|r| &r.category == category) {
                days = rule.days;
            }
        }
        days
    }

    /// The configured body field of an item.
    pub fn body_of(&self, item: &FeedItem) -> Option<String> {
        match self.content {
            ContentField::Full => item.content.clone(),
            ContentField::Summary => item.summary.clone(),
        }
    }
}

/// Static mapping routing feeds into a target forum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumMapping {
    /// Forum slug on its instance
    pub slug: String,
    /// Hosting instance, e.g. "programming.dev"
    pub instance: String,
    /// Names of feeds whose items are posted here
    pub feeds: Vec<String>,
}

/// Per-instance aggregation of forum slugs, used as the federation
/// subscription allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    pub instance: String,
    pub forums: Vec<String>,
}

/// Aggregate forum mappings into one allow-list entry per instance,
/// preserving first-seen instance order.
pub fn derive_allow_list(mappings: &[ForumMapping]) -> Vec<AllowListEntry> {
    let mut entries: Vec<AllowListEntry> = Vec::new();
    for mapping in mappings {
        match entries.iter_mut().find(|e| e.instance == mapping.instance) {
            Some(entry) => entry.forums.push(mapping.slug.clone()),
            None => entries.push(AllowListEntry {
                instance: mapping.instance.clone(),
                forums: vec![mapping.slug.clone()],
            }),
        }
    }
    entries
}

/// Ledger entry for one feed item ever seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    /// Canonical item URL; immutable once created
    pub link: String,
    /// Remaining whole days the post should stay featured
    pub pin_days: i64,
    /// True once a feature action is owed or issued and not yet reversed
    pub featured: bool,
    /// Forum-assigned id, learned from the federation echo
    pub post_id: Option<PostId>,
}

/// A post ready to be created in a forum
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub forum_id: ForumId,
    pub title: String,
    pub body: Option<String>,
    pub url: Option<String>,
}

/// A post observed in a subscribed forum via the federation client
#[derive(Debug, Clone)]
pub struct ObservedPost {
    pub post_id: PostId,
    pub url: Option<String>,
    pub title: String,
    pub creator_name: String,
}
