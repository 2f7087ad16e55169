use std::sync::Arc;

use tracing::info;

use crate::application::{SyncLogRepository, VectorRepository};
use crate::domain::DomainError;

/// Makes sure the destination can take a sync: optionally creates the schema,
/// then checks that everything the run writes to exists.
pub struct PrepareDestinationUseCase {
    vector_repo: Arc<dyn VectorRepository>,
    sync_log: Arc<dyn SyncLogRepository>,
}

impl PrepareDestinationUseCase {
    pub fn new(
        vector_repo: Arc<dyn VectorRepository>,
        sync_log: Arc<dyn SyncLogRepository>,
    ) -> Self {
        Self {
            vector_repo,
            sync_log,
        }
    }

    pub async fn execute(&self, init_schema: bool) -> Result<(), DomainError> {
        if init_schema {
            info!("Initializing destination schema...");
            self.vector_repo.initialize().await?;
            self.sync_log.initialize().await?;
        }

        info!("Verifying destination tables...");
        self.vector_repo.verify().await?;
        self.sync_log.verify().await?;
        info!("Destination ready");

        Ok(())
    }
}
