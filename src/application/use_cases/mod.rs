mod list_sync_runs;
mod prepare_destination;
mod record_processor;
mod search_embeddings;
mod sync_embeddings;
mod sync_mode;

pub use list_sync_runs::*;
pub use prepare_destination::*;
pub use record_processor::*;
pub use search_embeddings::*;
pub use sync_embeddings::*;
pub use sync_mode::*;
