use std::sync::Arc;

use crate::application::SyncLogRepository;
use crate::domain::{DomainError, SyncLogEntry};

pub struct ListSyncRunsUseCase {
    sync_log: Arc<dyn SyncLogRepository>,
}

impl ListSyncRunsUseCase {
    pub fn new(sync_log: Arc<dyn SyncLogRepository>) -> Self {
        Self { sync_log }
    }

    pub async fn execute(&self, limit: usize) -> Result<Vec<SyncLogEntry>, DomainError> {
        self.sync_log.recent(limit.max(1)).await
    }
}
