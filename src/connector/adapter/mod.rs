mod in_memory_event_source;
mod in_memory_sync_log_repository;
mod in_memory_vector_repository;
mod mock_embedding;
mod ort_embedding;
mod pgvector_collection_repository;
mod pgvector_table_repository;
mod postgres_connection;
mod postgres_event_source;
mod postgres_schema;
mod postgres_sync_log_repository;

pub use in_memory_event_source::*;
pub use in_memory_sync_log_repository::*;
pub use in_memory_vector_repository::*;
pub use mock_embedding::*;
pub use ort_embedding::*;
pub use pgvector_collection_repository::*;
pub use pgvector_table_repository::*;
pub use postgres_connection::*;
pub use postgres_event_source::*;
pub use postgres_sync_log_repository::*;
