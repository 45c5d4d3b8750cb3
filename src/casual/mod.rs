// src/casual/mod.rs
// Casual-request store: a narrow key-value/document upsert interface for
// activity-partner requests. No separate matching database is introduced;
// a concrete adapter (SQL store, HTTP service, or the vector store's own
// payload fields) can be substituted without touching the Scheduler.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{CasualMatch, CasualRequestRecord};

#[async_trait]
pub trait CasualRequestStore: Send + Sync {
    async fn put_casual_request(&self, record: CasualRequestRecord) -> anyhow::Result<()>;
    async fn find_casual_matches(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<CasualMatch>>;
}

/// In-memory store. A production deployment would point this at the
/// vector store's payload fields or a small SQL table; this adapter keeps
/// the orchestrator runnable standalone and is what the test suite uses.
#[derive(Default)]
pub struct InMemoryCasualRequestStore {
    records: Mutex<Vec<CasualRequestRecord>>,
}

impl InMemoryCasualRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CasualRequestStore for InMemoryCasualRequestStore {
    /// At most one active record per user: a fresh request upserts over
    /// the existing row, keeping its original `created_at` but resetting
    /// `updated_at`/`last_activity_at` to the new record's timestamps.
    async fn put_casual_request(&self, mut record: CasualRequestRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock();
        if let Some(existing) = records.iter().find(|r| r.user_id == record.user_id) {
            record.created_at = existing.created_at;
        }
        records.retain(|r| r.user_id != record.user_id);
        records.push(record);
        Ok(())
    }

    async fn find_casual_matches(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<CasualMatch>> {
        let records = self.records.lock();
        let matches = records
            .iter()
            .filter(|r| r.is_active && r.user_id != user_id)
            .take(limit)
            .map(|r| CasualMatch {
                user_id: r.user_id.clone(),
                summary: r.optimised_query.clone(),
                score: 1.0,
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, optimised_query: &str) -> CasualRequestRecord {
        let now = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        CasualRequestRecord {
            user_id: user_id.to_string(),
            original_query: optimised_query.to_string(),
            optimised_query: optimised_query.to_string(),
            province_id: None,
            city_id: None,
            preferences: serde_json::json!({}),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    #[tokio::test]
    async fn put_then_find_returns_active_matches() {
        let store = InMemoryCasualRequestStore::new();
        store
            .put_casual_request(record("u1", "looking for hiking partners this weekend"))
            .await
            .unwrap();

        let matches = store.find_casual_matches("u2", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].user_id, "u1");
    }

    #[tokio::test]
    async fn requester_does_not_match_themselves() {
        let store = InMemoryCasualRequestStore::new();
        store.put_casual_request(record("u1", "hiking")).await.unwrap();

        let matches = store.find_casual_matches("u1", 10).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn second_request_for_same_user_upserts_and_keeps_original_created_at() {
        let store = InMemoryCasualRequestStore::new();
        store.put_casual_request(record("u1", "hiking")).await.unwrap();

        let mut second = record("u1", "coffee");
        second.created_at = chrono::DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        store.put_casual_request(second).await.unwrap();

        let records = store.records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].optimised_query, "coffee");
        assert_eq!(
            records[0].created_at,
            chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc)
        );
    }
}
