pub mod search_controller;
pub mod status_controller;
pub mod sync_controller;
pub mod verify_controller;

pub use search_controller::SearchController;
pub use status_controller::StatusController;
pub use sync_controller::SyncController;
pub use verify_controller::VerifyController;
