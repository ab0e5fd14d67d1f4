//! Pin maintenance task - daily decrement and unfeature pass

use std::sync::Arc;

use time::Duration;

use crate::model::PostRecord;
use crate::ports::{Clock, DayTracker, ForumClient, LedgerError, PostLedger};

/// Configuration for the pin maintenance task
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Forward shift applied to "now" before taking the day-of-week, so the
    /// boundary is not sampled right at midnight
    pub day_skew: Duration,
    /// Decrement and clear, but issue no forum calls
    pub dry_run: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            day_skew: Duration::minutes(30),
            dry_run: false,
        }
    }
}

/// Timer-driven task expiring pin windows.
///
/// Runs far more often than once a day; the persisted day marker gates the
/// actual decrement pass to exactly one run per effective day.
pub struct PinMaintenance<L, D, C, Cl>
where
    L: PostLedger + ?Sized,
    D: DayTracker + ?Sized,
    C: ForumClient + ?Sized,
    Cl: Clock + ?Sized,
{
    ledger: Arc<L>,
    tracker: Arc<D>,
    forum_client: Arc<C>,
    clock: Arc<Cl>,
    config: MaintenanceConfig,
}

impl<L, D, C, Cl> PinMaintenance<L, D, C, Cl>
where
    L: PostLedger + ?Sized,
    D: DayTracker + ?Sized,
    C: ForumClient + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        ledger: Arc<L>,
        tracker: Arc<D>,
        forum_client: Arc<C>,
        clock: Arc<Cl>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            ledger,
            tracker,
            forum_client,
            clock,
            config,
        }
    }

    /// Run a single maintenance tick.
    ///
    /// Returns true when a day boundary was crossed and the decrement pass
    /// ran.
    pub async fn tick(&self) -> Result<bool, LedgerError> {
        let effective_day = self.effective_day();
        if !self.tracker.advance_if_changed(effective_day).await? {
            return Ok(false);
        }

        tracing::info!(day = effective_day, "Day changed, decrementing pin windows");

        let expired = self.ledger.decrement_all_featured().await?;
        tracing::info!(expired = expired.len(), "Decremented featured posts");

        for record in &expired {
            self.unfeature(record).await;
        }
        Ok(true)
    }

    /// Day-of-week (Sunday = 0) of "now" shifted forward by the configured
    /// skew.
    fn effective_day(&self) -> u8 {
        (self.clock.now() + self.config.day_skew)
            .weekday()
            .number_days_from_sunday()
    }

    /// Best-effort unfeature of one expired record. Failures are logged and
    /// never retried; the featured flag is cleared regardless so the record
    /// is not decremented again on later days.
    async fn unfeature(&self, record: &PostRecord) {
        match record.post_id {
            Some(post_id) if self.config.dry_run => {
                tracing::info!(link = %record.link, post_id = %post_id, "[DRY RUN] Would unfeature post");
            }
            Some(post_id) => {
                match self.forum_client.set_featured(post_id, false).await {
                    Ok(()) => {
                        tracing::info!(link = %record.link, post_id = %post_id, "Unfeatured post");
                    }
                    Err(e) => {
                        tracing::error!(
                            link = %record.link,
                            post_id = %post_id,
                            error = %e,
                            "Failed to unfeature post; it stays pinned until reconciled manually"
                        );
                    }
                }
            }
            None => {
                tracing::warn!(
                    link = %record.link,
                    "Pin window elapsed but the post was never observed in a subscribed forum"
                );
            }
        }

        if let Err(e) = self.ledger.clear_featured(&record.link).await {
            tracing::error!(link = %record.link, error = %e, "Failed to clear featured flag");
        }
    }
}
