//! Feature-on-publish reaction - pins the bot's own posts once echoed back
//!
//! The publication task never learns the forum-assigned post id at creation
//! time; it is only known once the federation layer echoes the post back
//! through the subscription. This reaction closes that loop.

use std::sync::Arc;

use crate::model::ObservedPost;
use crate::ports::{ForumClient, LedgerError, PostLedger};

/// Handler for posts observed in subscribed forums
pub struct FeatureOnPublish<L, C>
where
    L: PostLedger + ?Sized,
    C: ForumClient + ?Sized,
{
    ledger: Arc<L>,
    forum_client: Arc<C>,
    bot_username: String,
}

impl<L, C> FeatureOnPublish<L, C>
where
    L: PostLedger + ?Sized,
    C: ForumClient + ?Sized,
{
    pub fn new(ledger: Arc<L>, forum_client: Arc<C>, bot_username: impl Into<String>) -> Self {
        Self {
            ledger,
            forum_client,
            bot_username: bot_username.into(),
        }
    }

    /// Handle one observed post.
    ///
    /// Acts only on posts created by this bot whose ledger entry carries a
    /// positive pin window. Returns true when a feature request was issued.
    pub async fn handle(&self, post: &ObservedPost) -> Result<bool, LedgerError> {
        if post.creator_name != self.bot_username {
            return Ok(false);
        }
        let Some(url) = post.url.as_deref() else {
            return Ok(false);
        };
        let Some(record) = self.ledger.get(url).await? else {
            return Ok(false);
        };
        if record.pin_days <= 0 {
            return Ok(false);
        }

        // Persist the id before the feature request so maintenance can
        // still unfeature the post even if the request fails.
        self.ledger.set_post_id(url, post.post_id).await?;

        match self.forum_client.set_featured(post.post_id, true).await {
            Ok(()) => {
                tracing::info!(
                    link = %url,
                    post_id = %post.post_id,
                    title = %post.title,
                    "Pinned post"
                );
            }
            Err(e) => {
                // Not retried; the pin window keeps counting down regardless.
                tracing::error!(link = %url, post_id = %post.post_id, error = %e, "Failed to pin post");
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForumId, PostDraft, PostId, PostRecord};
    use crate::ports::ForumError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLedger {
        records: Mutex<HashMap<String, PostRecord>>,
    }

    impl FakeLedger {
        fn with_record(self, link: &str, pin_days: i64) -> Self {
            self.records.lock().unwrap().insert(
                link.to_string(),
                PostRecord {
                    link: link.to_string(),
                    pin_days,
                    featured: pin_days > 0,
                    post_id: None,
                },
            );
            self
        }
    }

    #[async_trait]
    impl PostLedger for FakeLedger {
        async fn record_if_new(&self, _link: &str, _pin_days: i64) -> Result<bool, LedgerError> {
            unimplemented!("not used by the reaction")
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
            unimplemented!("not used by the reaction")
        }

        async fn clear_featured(&self, _link: &str) -> Result<(), LedgerError> {
            unimplemented!("not used by the reaction")
        }

        async fn count(&self) -> Result<u64, LedgerError> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
    }

    #[derive(Default)]
    struct RecordingForumClient {
        featured_calls: Mutex<Vec<(PostId, bool)>>,
    }

    #[async_trait]
    impl ForumClient for RecordingForumClient {
        async fn resolve_forum(&self, slug: &str, _instance: &str) -> Result<ForumId, ForumError> {
            Err(ForumError::UnknownForum(slug.to_string()))
        }

        async fn create_post(&self, _draft: &PostDraft) -> Result<(), ForumError> {
            Ok(())
        }

        async fn set_featured(&self, post_id: PostId, featured: bool) -> Result<(), ForumError> {
            self.featured_calls.lock().unwrap().push((post_id, featured));
            Ok(())
        }
    }

    fn observed(creator: &str, url: Option<&str>) -> ObservedPost {
        ObservedPost {
            post_id: PostId(99),
            url: url.map(str::to_string),
            title: "Godot 4.3 released".to_string(),
            creator_name: creator.to_string(),
        }
    }

    fn reaction(
        ledger: FakeLedger,
    ) -> (
        FeatureOnPublish<FakeLedger, RecordingForumClient>,
        Arc<FakeLedger>,
        Arc<RecordingForumClient>,
    ) {
        let ledger = Arc::new(ledger);
        let client = Arc::new(RecordingForumClient::default());
        let handler = FeatureOnPublish::new(Arc::clone(&ledger), Arc::clone(&client), "herald");
        (handler, ledger, client)
    }

    #[tokio::test]
    async fn pins_own_post_with_positive_window() {
        let (handler, ledger, client) =
            reaction(FakeLedger::default().with_record("https://a", 7));

        let issued = handler
            .handle(&observed("herald", Some("https://a")))
            .await
            .unwrap();

        assert!(issued);
        assert_eq!(
            *client.featured_calls.lock().unwrap(),
            vec![(PostId(99), true)]
        );
        assert_eq!(
            ledger.get("https://a").await.unwrap().unwrap().post_id,
            Some(PostId(99))
        );
    }

    #[tokio::test]
    async fn ignores_posts_by_other_creators() {
        let (handler, _ledger, client) =
            reaction(FakeLedger::default().with_record("https://a", 7));

        let issued = handler
            .handle(&observed("someone_else", Some("https://a")))
            .await
            .unwrap();

        assert!(!issued);
        assert!(client.featured_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ignores_zero_duration_posts() {
        let (handler, _ledger, client) =
            reaction(FakeLedger::default().with_record("https://a", 0));

        let issued = handler
            .handle(&observed("herald", Some("https://a")))
            .await
            .unwrap();

        assert!(!issued);
        assert!(client.featured_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ignores_unknown_links_and_posts_without_url() {
        let (handler, _ledger, client) = reaction(FakeLedger::default());

        assert!(
            !handler
                .handle(&observed("herald", Some("https://unknown")))
                .await
                .unwrap()
        );
        assert!(!handler.handle(&observed("herald", None)).await.unwrap());
        assert!(client.featured_calls.lock().unwrap().is_empty());
    }
}
