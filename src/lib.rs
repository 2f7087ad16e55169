pub mod application;
pub mod cli;
pub mod config;
pub mod connector;
pub mod domain;

pub use application::{
    EmbeddingService, EventSource, ListSyncRunsUseCase, PrepareDestinationUseCase,
    SearchEmbeddingsUseCase, SyncEmbeddingsUseCase, SyncLogRepository, VectorRepository,
};

pub use cli::{Cli, Commands, SettingsArgs};

pub use config::{AppConfig, DatabaseConfig, EmbeddingSettings, ProcessingConfig, VectorBackend};

pub use connector::{
    Container, ContainerConfig, InMemoryEventSource, InMemorySyncLogRepository,
    InMemoryVectorRepository, MockEmbedding, OrtEmbedding, PgVectorCollectionRepository,
    PgVectorTableRepository, PostgresConnection, PostgresEventSource, PostgresSyncLogRepository,
    Router,
};

pub use domain::{
    ContentStyle, DomainError, Embedding, EmbeddingConfig, IncrementalPolicy, RecordKind,
    SearchHit, SearchQuery, Session, Speaker, SyncMode, SyncSummary,
};
