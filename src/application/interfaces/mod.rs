mod embedding_service;
mod event_source;
mod sync_log_repository;
mod vector_repository;

pub use embedding_service::*;
pub use event_source::*;
pub use sync_log_repository::*;
pub use vector_repository::*;
