//! HTTP feed source adapter (reqwest + feed-rs)

use async_trait::async_trait;
use feed_herald_domain::{FeedError, FeedItem, FeedSource};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("feed-herald/", env!("CARGO_PKG_VERSION"));

/// Feed source fetching and parsing remote RSS/Atom documents
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpFeedSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Http(format!(
                "feed fetch failed with status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;

        let feed =
            feed_rs::parser::parse(bytes.as_ref()).map_err(|e| FeedError::Parse(e.to_string()))?;

        Ok(feed.entries.into_iter().filter_map(entry_to_item).collect())
    }
}

fn entry_to_item(entry: feed_rs::model::Entry) -> Option<FeedItem> {
    let link = select_entry_link(&entry)?;
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_default();
    let content = entry.content.as_ref().and_then(|c| c.body.clone());
    let summary = entry.summary.as_ref().map(|s| s.content.clone());
    let categories = entry.categories.iter().map(|c| c.term.clone()).collect();

    Some(FeedItem {
        link,
        title,
        content,
        summary,
        categories,
    })
}

/// Prefer the alternate (or unqualified) link, fall back to any non-empty
/// link, then to an http(s) entry id. Entries with none of those are
/// unusable as ledger keys and get dropped.
fn select_entry_link(entry: &feed_rs::model::Entry) -> Option<String> {
    for link in &entry.links {
        let href = link.href.trim();
        if href.is_empty() {
            continue;
        }
        let rel = link.rel.as_deref().unwrap_or("");
        if rel.is_empty() || rel.eq_ignore_ascii_case("alternate") {
            return Some(href.to_string());
        }
    }
    if let Some(link) = entry.links.iter().find(|l| !l.href.trim().is_empty()) {
        return Some(link.href.clone());
    }
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }
    None
}
