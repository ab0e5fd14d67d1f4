//! In-memory state store for testing and offline mode

use async_trait::async_trait;
use feed_herald_domain::{DayTracker, LedgerError, PostId, PostLedger, PostRecord};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory post ledger and day tracker
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, PostRecord>>,
    day: RwLock<Option<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            day: RwLock::new(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostLedger for InMemoryStore {
    async fn record_if_new(&self, link: &str, pin_days: i64) -> Result<bool, LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
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
        let records = self
            .records
            .read()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(records.get(link).cloned())
    }

    async fn set_post_id(&self, link: &str, post_id: PostId) -> Result<(), LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        if let Some(record) = records.get_mut(link) {
            record.post_id = Some(post_id);
        }
        Ok(())
    }

    async fn decrement_all_featured(&self) -> Result<Vec<PostRecord>, LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        let mut expired = Vec::new();
        // BTreeMap iteration keeps the link order stable.
        for record in records.values_mut().filter(|r| r.featured) {
            record.pin_days -= 1;
            if record.pin_days == 0 {
                expired.push(record.clone());
            }
        }
        Ok(expired)
    }

    async fn clear_featured(&self, link: &str) -> Result<(), LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        if let Some(record) = records.get_mut(link) {
            record.featured = false;
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let records = self
            .records
            .read()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(records.len() as u64)
    }
}

#[async_trait]
impl DayTracker for InMemoryStore {
    async fn current(&self) -> Result<Option<u8>, LedgerError> {
        let day = self
            .day
            .read()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(*day)
    }

    async fn advance_if_changed(&self, new_day: u8) -> Result<bool, LedgerError> {
        let mut day = self
            .day
            .write()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        if *day == Some(new_day) {
            return Ok(false);
        }
        *day = Some(new_day);
        Ok(true)
    }
}
