//! Publication task - fetches feeds and posts new items into mapped forums

use std::sync::Arc;

use crate::model::{FeedItem, FeedSpec, ForumMapping, PostDraft};
use crate::ports::{FeedSource, ForumClient, ForumError, PostLedger};

/// Configuration for the publication task
#[derive(Debug, Clone, Default)]
pub struct PublishConfig {
    /// Feeds to poll, in processing order
    pub feeds: Vec<FeedSpec>,
    /// Forum mappings routing feed items
    pub forums: Vec<ForumMapping>,
    /// Record items but issue no forum calls
    pub dry_run: bool,
}

/// Timer-driven task publishing new feed items.
///
/// Idempotence rests on the ledger: an item is posted only on the tick that
/// first records its link. Errors are isolated per feed and per item; a tick
/// never aborts as a whole.
pub struct PublishTask<F, L, C>
where
    F: FeedSource + ?Sized,
    L: PostLedger + ?Sized,
    C: ForumClient + ?Sized,
{
    feed_source: Arc<F>,
    ledger: Arc<L>,
    forum_client: Arc<C>,
    config: PublishConfig,
}

impl<F, L, C> PublishTask<F, L, C>
where
    F: FeedSource + ?Sized,
    L: PostLedger + ?Sized,
    C: ForumClient + ?Sized,
{
    pub fn new(
        feed_source: Arc<F>,
        ledger: Arc<L>,
        forum_client: Arc<C>,
        config: PublishConfig,
    ) -> Self {
        Self {
            feed_source,
            ledger,
            forum_client,
            config,
        }
    }

    /// Run a single publish tick over all configured feeds.
    ///
    /// Returns the number of newly recorded items.
    pub async fn tick(&self) -> usize {
        let mut created = 0;
        for feed in &self.config.feeds {
            match self.feed_source.fetch(&feed.url).await {
                Ok(items) => created += self.publish_items(feed, items).await,
                Err(e) => {
                    tracing::error!(feed = %feed.name, url = %feed.url, error = %e, "Failed to fetch feed");
                }
            }
        }
        created
    }

    async fn publish_items(&self, feed: &FeedSpec, items: Vec<FeedItem>) -> usize {
        let mut created = 0;
        for item in items {
            let pin_days = feed.pin_days_for(&item.categories);

            match self.ledger.record_if_new(&item.link, pin_days).await {
                Ok(true) => {}
                // Already published on an earlier tick
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(link = %item.link, error = %e, "Failed to record item");
                    continue;
                }
            }

            created += 1;
            tracing::info!(
                link = %item.link,
                feed = %feed.name,
                pin_days,
                "Recorded new item"
            );

            if self.config.dry_run {
                tracing::info!(link = %item.link, "[DRY RUN] Would create posts");
                continue;
            }

            for mapping in &self.config.forums {
                if !mapping.feeds.iter().any(|name| name == &feed.name) {
                    continue;
                }
                if let Err(e) = self.create_in_forum(mapping, feed, &item).await {
                    tracing::error!(
                        link = %item.link,
                        forum = %mapping.slug,
                        instance = %mapping.instance,
                        error = %e,
                        "Failed to create post"
                    );
                }
            }
        }
        created
    }

    async fn create_in_forum(
        &self,
        mapping: &ForumMapping,
        feed: &FeedSpec,
        item: &FeedItem,
    ) -> Result<(), ForumError> {
        let forum_id = self
            .forum_client
            .resolve_forum(&mapping.slug, &mapping.instance)
            .await?;

        let draft = PostDraft {
            forum_id,
            title: item.title.clone(),
            body: feed.body_of(item),
            url: Some(item.link.clone()),
        };
        self.forum_client.create_post(&draft).await?;

        tracing::info!(link = %item.link, forum = %mapping.slug, "Created post");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentField, ForumId, PinRule, PostId, PostRecord};
    use crate::ports::{FeedError, LedgerError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeFeedSource {
        feeds: HashMap<String, Vec<FeedItem>>,
    }

    #[async_trait]
    impl FeedSource for FakeFeedSource {
        async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| FeedError::Http("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        records: Mutex<HashMap<String, PostRecord>>,
    }

    #[async_trait]
    impl PostLedger for FakeLedger {
        async fn record_if_new(&self, link: &str, pin_days: i64) -> Result<bool, LedgerError> {
            let mut records = self.records.lock().unwrap();
            if records.contains_key(link) {
                return Ok(false);
            }
            records.insert(
                link.to_string(),
                PostRecord {
                    link: link.to_string(),
                    pin_days,
                    featured: pin_days > 0,
                    post_id: None,
                },
            );
            Ok(true)
        }

        async fn get(&self, link: &str) -> Result<Option<PostRecord>, LedgerError> {
            Ok(self.records.lock().unwrap().get(link).cloned())
        }

        async fn set_post_id(&self, link: &str, post_id: PostId) -> Result<(), LedgerError> {
            if let Some(record) = self.records.lock().unwrap().get_mut(link) {
                record.post_id = Some(post_id);
            }
            Ok(())
        }

        async fn decrement_all_featured(&self) -> Result<Vec<PostRecord>, LedgerError> {
            let mut records = self.records.lock().unwrap();
            let mut expired = Vec::new();
            for record in records.values_mut().filter(|r| r.featured) {
                record.pin_days -= 1;
                if record.pin_days == 0 {
                    expired.push(record.clone());
                }
            }
            expired.sort_by(|a, b| a.link.cmp(&b.link));
            Ok(expired)
        }

        async fn clear_featured(&self, link: &str) -> Result<(), LedgerError> {
            if let Some(record) = self.records.lock().unwrap().get_mut(link) {
                record.featured = false;
            }
            Ok(())
        }

        async fn count(&self) -> Result<u64, LedgerError> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
    }

    #[derive(Default)]
    struct FakeForumClient {
        drafts: Mutex<Vec<PostDraft>>,
        fail_create: bool,
    }

    #[async_trait]
    impl ForumClient for FakeForumClient {
        async fn resolve_forum(&self, slug: &str, _instance: &str) -> Result<ForumId, ForumError> {
            match slug {
                "godot" => Ok(ForumId(11)),
                "unreal_engine" => Ok(ForumId(22)),
                other => Err(ForumError::UnknownForum(other.to_string())),
            }
        }

        async fn create_post(&self, draft: &PostDraft) -> Result<(), ForumError> {
            if self.fail_create {
                return Err(ForumError::Api("boom".to_string()));
            }
            self.drafts.lock().unwrap().push(draft.clone());
            Ok(())
        }

        async fn set_featured(&self, _post_id: PostId, _featured: bool) -> Result<(), ForumError> {
            Ok(())
        }
    }

    fn item(link: &str, categories: &[&str]) -> FeedItem {
        FeedItem {
            link: link.to_string(),
            title: format!("Title of {link}"),
            content: Some("full content".to_string()),
            summary: Some("short summary".to_string()),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn godot_feed() -> FeedSpec {
        FeedSpec {
            name: "godot".to_string(),
            url: "https://godotengine.org/rss.xml".to_string(),
            pin_rules: vec![
                PinRule {
                    category: "Release".to_string(),
                    days: 7,
                },
                PinRule {
                    category: "Pre-Release".to_string(),
                    days: 3,
                },
            ],
            content: ContentField::Full,
        }
    }

    fn godot_mapping() -> ForumMapping {
        ForumMapping {
            slug: "godot".to_string(),
            instance: "programming.dev".to_string(),
            feeds: vec!["godot".to_string()],
        }
    }

    fn task(
        feeds: HashMap<String, Vec<FeedItem>>,
        config: PublishConfig,
    ) -> (
        PublishTask<FakeFeedSource, FakeLedger, FakeForumClient>,
        Arc<FakeLedger>,
        Arc<FakeForumClient>,
    ) {
        let source = Arc::new(FakeFeedSource { feeds });
        let ledger = Arc::new(FakeLedger::default());
        let client = Arc::new(FakeForumClient::default());
        let task = PublishTask::new(
            source,
            Arc::clone(&ledger),
            Arc::clone(&client),
            config,
        );
        (task, ledger, client)
    }

    #[tokio::test]
    async fn publishes_new_item_with_pin_window() {
        let feed = godot_feed();
        let mut feeds = HashMap::new();
        feeds.insert(
            feed.url.clone(),
            vec![item("https://godotengine.org/a1", &["Release"])],
        );

        let (task, ledger, client) = task(
            feeds,
            PublishConfig {
                feeds: vec![feed],
                forums: vec![godot_mapping()],
                dry_run: false,
            },
        );

        assert_eq!(task.tick().await, 1);

        let record = ledger.get("https://godotengine.org/a1").await.unwrap().unwrap();
        assert_eq!(record.pin_days, 7);
        assert!(record.featured);

        let drafts = client.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].forum_id, ForumId(11));
        assert_eq!(drafts[0].url.as_deref(), Some("https://godotengine.org/a1"));
        assert_eq!(drafts[0].body.as_deref(), Some("full content"));
    }

    #[tokio::test]
    async fn second_tick_is_idempotent() {
        let feed = godot_feed();
        let mut feeds = HashMap::new();
        feeds.insert(
            feed.url.clone(),
            vec![item("https://godotengine.org/a1", &[])],
        );

        let (task, ledger, client) = task(
            feeds,
            PublishConfig {
                feeds: vec![feed],
                forums: vec![godot_mapping()],
                dry_run: false,
            },
        );

        assert_eq!(task.tick().await, 1);
        assert_eq!(task.tick().await, 0);

        assert_eq!(ledger.count().await.unwrap(), 1);
        assert_eq!(client.drafts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn last_matching_category_rule_wins() {
        let feed = godot_feed();
        let mut feeds = HashMap::new();
        feeds.insert(
            feed.url.clone(),
            vec![item("https://godotengine.org/rc1", &["Release", "Pre-Release"])],
        );

        let (task, ledger, _client) = task(
            feeds,
            PublishConfig {
                feeds: vec![feed],
                forums: vec![],
                dry_run: false,
            },
        );
        task.tick().await;

        let record = ledger.get("https://godotengine.org/rc1").await.unwrap().unwrap();
        assert_eq!(record.pin_days, 3);
    }

    #[tokio::test]
    async fn summary_feed_uses_summary_body() {
        let feed = FeedSpec {
            name: "unreal".to_string(),
            url: "https://www.unrealengine.com/rss".to_string(),
            pin_rules: vec![],
            content: ContentField::Summary,
        };
        let mut feeds = HashMap::new();
        feeds.insert(feed.url.clone(), vec![item("https://unreal.example/u1", &[])]);

        let (task, _ledger, client) = task(
            feeds,
            PublishConfig {
                feeds: vec![feed],
                forums: vec![ForumMapping {
                    slug: "unreal_engine".to_string(),
                    instance: "programming.dev".to_string(),
                    feeds: vec!["unreal".to_string()],
                }],
                dry_run: false,
            },
        );
        task.tick().await;

        let drafts = client.drafts.lock().unwrap();
        assert_eq!(drafts[0].body.as_deref(), Some("short summary"));
    }

    #[tokio::test]
    async fn failed_feed_does_not_block_others() {
        let godot = godot_feed();
        let unity = FeedSpec {
            name: "unity".to_string(),
            url: "https://blogs.unity3d.com/feed/".to_string(),
            pin_rules: vec![],
            content: ContentField::Full,
        };

        // Only the unity feed resolves; godot fetch fails.
        let mut feeds = HashMap::new();
        feeds.insert(unity.url.clone(), vec![item("https://unity.example/u1", &[])]);

        let (task, ledger, _client) = task(
            feeds,
            PublishConfig {
                feeds: vec![godot, unity],
                forums: vec![],
                dry_run: false,
            },
        );

        assert_eq!(task.tick().await, 1);
        assert!(ledger.get("https://unity.example/u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_post_creation_still_records_item() {
        let feed = godot_feed();
        let mut feeds = HashMap::new();
        feeds.insert(
            feed.url.clone(),
            vec![item("https://godotengine.org/a1", &[])],
        );

        let source = Arc::new(FakeFeedSource { feeds });
        let ledger = Arc::new(FakeLedger::default());
        let client = Arc::new(FakeForumClient {
            fail_create: true,
            ..Default::default()
        });
        let task = PublishTask::new(
            source,
            Arc::clone(&ledger),
            Arc::clone(&client),
            PublishConfig {
                feeds: vec![feed],
                forums: vec![godot_mapping()],
                dry_run: false,
            },
        );

        assert_eq!(task.tick().await, 1);
        assert!(ledger.get("https://godotengine.org/a1").await.unwrap().is_some());
        assert!(client.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_records_without_forum_calls() {
        let feed = godot_feed();
        let mut feeds = HashMap::new();
        feeds.insert(
            feed.url.clone(),
            vec![item("https://godotengine.org/a1", &["Release"])],
        );

        let (task, ledger, client) = task(
            feeds,
            PublishConfig {
                feeds: vec![feed],
                forums: vec![godot_mapping()],
                dry_run: true,
            },
        );

        assert_eq!(task.tick().await, 1);
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert!(client.drafts.lock().unwrap().is_empty());
    }
}
