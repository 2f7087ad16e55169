use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::application::SyncLogRepository;
use crate::domain::{DomainError, SyncLogEntry};

/// Sync log kept in memory, oldest entry first.
#[derive(Default)]
pub struct InMemorySyncLogRepository {
    entries: Arc<Mutex<Vec<SyncLogEntry>>>,
}

impl InMemorySyncLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl SyncLogRepository for InMemorySyncLogRepository {
    async fn initialize(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn verify(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn count_successful(&self, table_name: &str) -> Result<u64, DomainError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|e| e.is_success() && e.table_name == table_name)
            .count() as u64)
    }

    async fn last_successful_sync(
        &self,
        table_name: &str,
    ) -> Result<Option<DateTime<Utc>>, DomainError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|e| e.is_success() && e.table_name == table_name)
            .map(|e| e.sync_timestamp)
            .max())
    }

    async fn record(&self, entry: &SyncLogEntry) -> Result<(), DomainError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>, DomainError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::domain::UpsertCounts;

    #[tokio::test]
    async fn test_only_successes_count_as_checkpoints() {
        let log = InMemorySyncLogRepository::new();
        let started = Utc::now();

        log.record(&SyncLogEntry::failure("sessions", "boom", started, Value::Null))
            .await
            .unwrap();
        assert_eq!(log.count_successful("sessions").await.unwrap(), 0);
        assert!(log.last_successful_sync("sessions").await.unwrap().is_none());

        let ok = SyncLogEntry::success("sessions", 2, UpsertCounts::default(), started, Value::Null);
        log.record(&ok).await.unwrap();

        assert_eq!(log.count_successful("sessions").await.unwrap(), 1);
        assert_eq!(log.count_successful("speakers").await.unwrap(), 0);
        assert_eq!(
            log.last_successful_sync("sessions").await.unwrap(),
            Some(ok.sync_timestamp)
        );
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let log = InMemorySyncLogRepository::new();
        for name in ["a", "b", "c"] {
            log.record(&SyncLogEntry::failure(name, "x", Utc::now(), Value::Null))
                .await
                .unwrap();
        }

        let recent: Vec<String> = log
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.table_name)
            .collect();
        assert_eq!(recent, vec!["c", "b"]);
    }
}
