use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{SearchController, StatusController, SyncController, VerifyController};

pub struct Router<'a> {
    sync_controller: SyncController<'a>,
    verify_controller: VerifyController<'a>,
    status_controller: StatusController<'a>,
    search_controller: SearchController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            sync_controller: SyncController::new(container),
            verify_controller: VerifyController::new(container),
            status_controller: StatusController::new(container),
            search_controller: SearchController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Sync { mode } => self.sync_controller.sync(mode).await,
            Commands::Verify => self.verify_controller.verify().await,
            Commands::Status { limit } => self.status_controller.status(limit).await,
            Commands::Search {
                query,
                kind,
                num,
                min_score,
            } => {
                self.search_controller
                    .search(query, kind, num, min_score)
                    .await
            }
        }
    }
}
