//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{FeedItem, ForumId, ObservedPost, PostDraft, PostId, PostRecord};

/// Error type for feed source operations
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Feed parse error: {0}")]
    Parse(String),
}

/// Port for fetching and parsing a remote feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the feed at `url` and parse it into items, in feed order.
    ///
    /// Each call is a fresh fetch; the result is not cached.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError>;
}

/// Error type for ledger and day-tracker storage
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Port for the durable publication/pin ledger, keyed by item link.
///
/// Single source of truth for "have we already published this, and how long
/// should it stay pinned". Records are never deleted in normal operation.
#[async_trait]
pub trait PostLedger: Send + Sync {
    /// Insert a record for `link` with `featured = pin_days > 0`.
    ///
    /// Returns false without mutating anything when the link is already
    /// recorded; first-seen wins. Atomic per link.
    async fn record_if_new(&self, link: &str, pin_days: i64) -> Result<bool, LedgerError>;

    async fn get(&self, link: &str) -> Result<Option<PostRecord>, LedgerError>;

    /// Attach the forum-assigned post id once the federation layer echoes
    /// the post back.
    async fn set_post_id(&self, link: &str, post_id: PostId) -> Result<(), LedgerError>;

    /// Decrement the pin window of every featured record once; returns the
    /// records that reached exactly zero, in link order.
    async fn decrement_all_featured(&self) -> Result<Vec<PostRecord>, LedgerError>;

    /// Clear the featured flag. Idempotent.
    async fn clear_featured(&self, link: &str) -> Result<(), LedgerError>;

    /// Total number of records ever seen.
    async fn count(&self) -> Result<u64, LedgerError>;
}

/// Port for the single persisted day marker gating daily maintenance
#[async_trait]
pub trait DayTracker: Send + Sync {
    async fn current(&self) -> Result<Option<u8>, LedgerError>;

    /// Store `day` and report whether it differed from the stored marker
    /// (or no marker existed yet). One logical check-then-set: this is the
    /// exactly-once day-boundary gate.
    async fn advance_if_changed(&self, day: u8) -> Result<bool, LedgerError>;
}

/// Error type for forum client operations
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unknown forum: {0}")]
    UnknownForum(String),
}

/// Port for the federated forum client
#[async_trait]
pub trait ForumClient: Send + Sync {
    /// Resolve a forum slug on an instance to its remote identifier.
    async fn resolve_forum(&self, slug: &str, instance: &str) -> Result<ForumId, ForumError>;

    async fn create_post(&self, draft: &PostDraft) -> Result<(), ForumError>;

    async fn set_featured(&self, post_id: PostId, featured: bool) -> Result<(), ForumError>;
}

/// Subscription surface of the federation client: posts that appeared in
/// allowed forums since the previous call.
#[async_trait]
pub trait PostStream: Send + Sync {
    async fn poll_new_posts(&self) -> Result<Vec<ObservedPost>, ForumError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
