use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::application::{
    EmbeddingService, EventSource, ListSyncRunsUseCase, PrepareDestinationUseCase,
    SearchEmbeddingsUseCase, SyncEmbeddingsUseCase, SyncLogRepository, SyncSettings,
    VectorRepository, ERROR_TARGET,
};
use crate::config::{AppConfig, VectorBackend};
use crate::connector::adapter::{
    BackoffPolicy, InMemorySyncLogRepository, InMemoryVectorRepository, MockEmbedding,
    OrtEmbedding, PgVectorCollectionRepository, PgVectorTableRepository, PostgresConnection,
    PostgresEventSource, PostgresSyncLogRepository,
};
use crate::domain::{ContentRenderer, EmbeddingConfig, IncrementalPolicy, SyncLogEntry};

const MAX_SEQUENCE_LENGTH: usize = 512;
const MOCK_MODEL_NAME: &str = "mock-embedding";

pub struct ContainerConfig {
    pub app: AppConfig,
    pub mock_embeddings: bool,
    /// Keep embeddings and the sync log in memory; the destination database
    /// is never touched.
    pub dry_run: bool,
    pub show_progress: bool,
}

/// Builds adapters from configuration and hands out use cases.
///
/// The destination side is set up eagerly. The source connection and the
/// embedding model are only created by the commands that need them.
pub struct Container {
    vector_repo: Arc<dyn VectorRepository>,
    sync_log: Arc<dyn SyncLogRepository>,
    dest_connection: Option<PostgresConnection>,
    source_connection: OnceCell<PostgresConnection>,
    embedding_service: OnceCell<Arc<dyn EmbeddingService>>,
    backoff: BackoffPolicy,
    config: ContainerConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let backoff = BackoffPolicy::default();
        let app = &config.app;
        let dimensions = app.embedding.dimension;

        let (vector_repo, sync_log, dest_connection): (
            Arc<dyn VectorRepository>,
            Arc<dyn SyncLogRepository>,
            Option<PostgresConnection>,
        ) = if config.dry_run {
            info!("Dry run: embeddings and sync log stay in memory");
            (
                Arc::new(InMemoryVectorRepository::new()),
                Arc::new(InMemorySyncLogRepository::new()),
                None,
            )
        } else {
            let connection =
                PostgresConnection::connect("destination", &app.dest_db, &backoff).await?;

            let vector_repo: Arc<dyn VectorRepository> = match app.backend {
                VectorBackend::Tables => {
                    debug!("Using dedicated pgvector tables");
                    Arc::new(PgVectorTableRepository::new(
                        connection.clone(),
                        app.table_names.clone(),
                        dimensions,
                    ))
                }
                VectorBackend::Collection => {
                    debug!("Using pgvector collection '{}'", app.collection_name);
                    Arc::new(PgVectorCollectionRepository::new(
                        connection.clone(),
                        &app.collection_name,
                        dimensions,
                    ))
                }
            };

            let sync_log = Arc::new(PostgresSyncLogRepository::new(
                connection.clone(),
                &app.table_names.sync_log,
            ));

            (vector_repo, sync_log, Some(connection))
        };

        Ok(Self {
            vector_repo,
            sync_log,
            dest_connection,
            source_connection: OnceCell::new(),
            embedding_service: OnceCell::new(),
            backoff,
            config,
        })
    }

    async fn source_connection(&self) -> Result<PostgresConnection> {
        let connection = self
            .source_connection
            .get_or_try_init(|| {
                PostgresConnection::connect("source", &self.config.app.source_db, &self.backoff)
            })
            .await?;
        Ok(connection.clone())
    }

    async fn embedding_service(&self) -> Result<Arc<dyn EmbeddingService>> {
        let service = self
            .embedding_service
            .get_or_try_init(|| async {
                let settings = &self.config.app.embedding;

                let service: Arc<dyn EmbeddingService> = if self.config.mock_embeddings {
                    debug!("Using mock embedding service");
                    let config = EmbeddingConfig::new(
                        MOCK_MODEL_NAME.to_string(),
                        settings.dimension,
                        MAX_SEQUENCE_LENGTH,
                    )
                    .with_normalize(settings.normalize);
                    Arc::new(MockEmbedding::with_config(config))
                } else {
                    debug!("Initializing ONNX embedding service...");
                    let config = EmbeddingConfig::new(
                        settings.model_name.clone(),
                        settings.dimension,
                        MAX_SEQUENCE_LENGTH,
                    )
                    .with_normalize(settings.normalize);
                    let cache_dir = settings.cache_dir.clone();
                    let device = settings.device.clone();
                    let service = tokio::task::spawn_blocking(move || {
                        OrtEmbedding::new(config, &cache_dir, &device)
                    })
                    .await??;
                    Arc::new(service)
                };

                Ok::<_, anyhow::Error>(service)
            })
            .await?;
        Ok(Arc::clone(service))
    }

    pub async fn sync_use_case(
        &self,
        policy_override: Option<IncrementalPolicy>,
    ) -> Result<SyncEmbeddingsUseCase> {
        let app = &self.config.app;

        let source: Arc<dyn EventSource> = Arc::new(
            PostgresEventSource::new(self.source_connection().await?)
                .with_change_column(app.processing.change_column.clone()),
        );

        let settings = SyncSettings {
            policy: policy_override.unwrap_or(app.processing.incremental_mode),
            lookback: chrono::Duration::try_hours(app.processing.lookback_hours)
                .unwrap_or(chrono::Duration::MAX),
            batch_size: app.embedding.batch_size,
            device: app.embedding.device.clone(),
            show_progress: self.config.show_progress,
        };

        Ok(SyncEmbeddingsUseCase::new(
            source,
            Arc::clone(&self.vector_repo),
            Arc::clone(&self.sync_log),
            self.embedding_service().await?,
            ContentRenderer::new(app.processing.content_style),
            settings,
        ))
    }

    pub fn prepare_use_case(&self) -> PrepareDestinationUseCase {
        PrepareDestinationUseCase::new(Arc::clone(&self.vector_repo), Arc::clone(&self.sync_log))
    }

    pub fn list_sync_runs_use_case(&self) -> ListSyncRunsUseCase {
        ListSyncRunsUseCase::new(Arc::clone(&self.sync_log))
    }

    pub async fn search_use_case(&self) -> Result<SearchEmbeddingsUseCase> {
        Ok(SearchEmbeddingsUseCase::new(
            Arc::clone(&self.vector_repo),
            self.embedding_service().await?,
        ))
    }

    pub fn vector_repo(&self) -> Arc<dyn VectorRepository> {
        Arc::clone(&self.vector_repo)
    }

    pub fn init_databases(&self) -> bool {
        self.config.app.processing.init_databases
    }

    pub fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Logs an `ERROR` run for a failure that happened before the sync
    /// itself started (source unreachable, model not loadable).
    pub async fn record_setup_failure(&self, error: &anyhow::Error) {
        let settings = &self.config.app.embedding;
        let entry = SyncLogEntry::failure(
            ERROR_TARGET,
            format!("{:#}", error),
            Utc::now(),
            json!({
                "model": settings.model_name,
                "device": settings.device,
                "batch_size": settings.batch_size,
            }),
        );
        if let Err(e) = self.sync_log.record(&entry).await {
            warn!("Could not record failed sync: {}", e);
        }
    }

    pub async fn close(&self) {
        if let Some(connection) = self.source_connection.get() {
            connection.close().await;
        }
        if let Some(connection) = &self.dest_connection {
            connection.close().await;
        }
    }
}
