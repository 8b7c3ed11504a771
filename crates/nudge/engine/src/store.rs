//! Persisted insight record store.
//!
//! The store is an external collaborator; this module defines the contract
//! and an in-memory reference implementation for tests and offline replay.

use std::collections::BTreeMap;
use std::sync::RwLock;

use nudge_types::{InsightId, InsightRecord};

use crate::error::{StorageError, StorageResult};

/// Storage interface for `(user_id, insight_id)` records.
pub trait InsightStateStore: Send + Sync {
    /// Get one record.
    fn get(&self, user_id: &str, insight_id: &InsightId) -> StorageResult<Option<InsightRecord>>;

    /// Insert or replace a record.
    fn upsert(&self, record: InsightRecord) -> StorageResult<()>;

    /// Every record for a user, ordered by insight id.
    fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<InsightRecord>>;
}

/// In-memory store. Deterministic iteration order.
#[derive(Default)]
pub struct InMemoryInsightStateStore {
    records: RwLock<BTreeMap<(String, InsightId), InsightRecord>>,
}

impl InMemoryInsightStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = InsightRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| ((r.user_id.clone(), r.insight_id.clone()), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }
}

impl InsightStateStore for InMemoryInsightStateStore {
    fn get(&self, user_id: &str, insight_id: &InsightId) -> StorageResult<Option<InsightRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard
            .get(&(user_id.to_string(), insight_id.clone()))
            .cloned())
    }

    fn upsert(&self, record: InsightRecord) -> StorageResult<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        guard.insert((record.user_id.clone(), record.insight_id.clone()), record);
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<InsightRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rec(user: &str, id: &str) -> InsightRecord {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        InsightRecord::new(user, InsightId::new(id), now)
    }

    #[test]
    fn upsert_and_get() {
        let store = InMemoryInsightStateStore::new();
        store.upsert(rec("u1", "zero_revenue")).unwrap();
        let got = store
            .get("u1", &InsightId::new("zero_revenue"))
            .unwrap()
            .unwrap();
        assert_eq!(got.user_id, "u1");
        assert!(store.get("u2", &InsightId::new("zero_revenue")).unwrap().is_none());
    }

    #[test]
    fn list_is_per_user_and_ordered() {
        let store = InMemoryInsightStateStore::with_records(vec![
            rec("u1", "zero_revenue"),
            rec("u2", "best_seller"),
            rec("u1", "failed_payments"),
        ]);
        let ids: Vec<String> = store
            .list_for_user("u1")
            .unwrap()
            .into_iter()
            .map(|r| r.insight_id.to_string())
            .collect();
        assert_eq!(ids, vec!["failed_payments", "zero_revenue"]);
    }

    #[test]
    fn upsert_replaces() {
        let store = InMemoryInsightStateStore::new();
        store.upsert(rec("u1", "a")).unwrap();
        let mut updated = rec("u1", "a");
        updated.cooldown.dismiss_count = 4;
        store.upsert(updated).unwrap();
        let list = store.list_for_user("u1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].cooldown.dismiss_count, 4);
    }
}
