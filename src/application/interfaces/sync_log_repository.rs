use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DomainError, SyncLogEntry};

/// Persistence for the sync audit log (also the incremental checkpoint).
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    async fn initialize(&self) -> Result<(), DomainError>;

    async fn verify(&self) -> Result<(), DomainError>;

    /// Number of successful runs logged for a target.
    async fn count_successful(&self, table_name: &str) -> Result<u64, DomainError>;

    /// Timestamp of the latest successful run for a target.
    async fn last_successful_sync(
        &self,
        table_name: &str,
    ) -> Result<Option<DateTime<Utc>>, DomainError>;

    async fn record(&self, entry: &SyncLogEntry) -> Result<(), DomainError>;

    /// Most recent entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>, DomainError>;
}
