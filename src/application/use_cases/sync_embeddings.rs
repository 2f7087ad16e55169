use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::application::{
    resolve_sync_mode, EmbeddingService, EventSource, RecordProcessor, SyncLogRepository,
    VectorRepository,
};
use crate::domain::{
    format_duration, incremental_since, ContentRenderer, DomainError, IncrementalPolicy,
    KindSummary, RecordKind, SyncLogEntry, SyncMode, SyncSummary, UpsertCounts,
};

/// Target name used for the audit row of a run that failed outright.
pub const ERROR_TARGET: &str = "error";

const BANNER: &str = "============================================================";

/// Run-level knobs for [`SyncEmbeddingsUseCase`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub policy: IncrementalPolicy,
    pub lookback: chrono::Duration,
    pub batch_size: usize,
    pub device: String,
    pub show_progress: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            policy: IncrementalPolicy::Auto,
            lookback: chrono::Duration::hours(24),
            batch_size: 32,
            device: "cpu".to_string(),
            show_progress: true,
        }
    }
}

/// fetch → render → embed → upsert → log, for sessions then speakers.
pub struct SyncEmbeddingsUseCase {
    source: Arc<dyn EventSource>,
    vector_repo: Arc<dyn VectorRepository>,
    sync_log: Arc<dyn SyncLogRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    renderer: ContentRenderer,
    settings: SyncSettings,
}

impl SyncEmbeddingsUseCase {
    pub fn new(
        source: Arc<dyn EventSource>,
        vector_repo: Arc<dyn VectorRepository>,
        sync_log: Arc<dyn SyncLogRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
        renderer: ContentRenderer,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            vector_repo,
            sync_log,
            embedding_service,
            renderer,
            settings,
        }
    }

    /// Runs one sync. On failure an `ERROR` row is written to the sync log
    /// (best effort) before the error is returned.
    pub async fn execute(&self) -> Result<SyncSummary, DomainError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        match self.run(started_at, timer).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Process failed: {}", e);
                let entry = SyncLogEntry::failure(
                    ERROR_TARGET,
                    e.to_string(),
                    started_at,
                    self.run_metadata(None, UpsertCounts::default()),
                );
                if let Err(log_err) = self.sync_log.record(&entry).await {
                    warn!("Could not record failed sync: {}", log_err);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        started_at: DateTime<Utc>,
        timer: Instant,
    ) -> Result<SyncSummary, DomainError> {
        let session_target = self.vector_repo.target_name(RecordKind::Session);
        let mode =
            resolve_sync_mode(self.settings.policy, self.sync_log.as_ref(), &session_target)
                .await?;

        info!("{}", BANNER);
        info!("Starting embeddings generation process");
        info!("Mode: {}", mode);
        info!("{}", BANNER);

        let processor = RecordProcessor::new(
            Arc::clone(&self.vector_repo),
            Arc::clone(&self.embedding_service),
            self.settings.batch_size,
        )
        .with_progress(self.settings.show_progress);

        let sessions = self.sync_sessions(&processor, mode, started_at).await?;
        let speakers = self.sync_speakers(&processor, mode, started_at).await?;

        let summary = SyncSummary {
            mode,
            sessions,
            speakers,
            elapsed: timer.elapsed(),
        };

        info!("{}", BANNER);
        info!("Process completed successfully!");
        info!("Total execution time: {}", summary.elapsed_human());
        info!("{}", summary.sessions);
        info!("{}", summary.speakers);
        info!("{}", BANNER);

        Ok(summary)
    }

    async fn sync_sessions(
        &self,
        processor: &RecordProcessor,
        mode: SyncMode,
        started_at: DateTime<Utc>,
    ) -> Result<KindSummary, DomainError> {
        let timer = Instant::now();
        info!("Starting: Processing sessions");

        let target = self.vector_repo.target_name(RecordKind::Session);
        let since = match mode {
            SyncMode::Full => None,
            SyncMode::Incremental => {
                let last = self.sync_log.last_successful_sync(&target).await?;
                let since = incremental_since(last, Utc::now(), self.settings.lookback);
                info!("Fetching sessions modified since: {}", since);
                if !self.source.supports_incremental() {
                    info!("Source does not track modifications; fetching all sessions");
                }
                Some(since)
            }
        };

        info!("Fetching sessions from source database...");
        let sessions = self.source.fetch_sessions(since).await?;
        info!("Fetched {} sessions", sessions.len());

        let documents: Vec<_> = sessions
            .iter()
            .map(|s| self.renderer.session_document(s))
            .collect();
        let counts = processor.process(RecordKind::Session, &documents).await?;

        self.sync_log
            .record(&SyncLogEntry::success(
                target,
                sessions.len() as u64,
                counts,
                started_at,
                self.run_metadata(Some(mode), counts),
            ))
            .await?;

        info!(
            "Completed: Processing sessions (took {})",
            format_duration(timer.elapsed().as_secs_f64())
        );
        Ok(KindSummary::new(
            RecordKind::Session,
            sessions.len() as u64,
            counts,
        ))
    }

    async fn sync_speakers(
        &self,
        processor: &RecordProcessor,
        mode: SyncMode,
        started_at: DateTime<Utc>,
    ) -> Result<KindSummary, DomainError> {
        let timer = Instant::now();
        info!("Starting: Processing speakers");

        let target = self.vector_repo.target_name(RecordKind::Speaker);

        // Speaker aggregates span every session, so speakers are always
        // fetched in full.
        info!("Fetching speakers from source database...");
        let speakers = self.source.fetch_speakers().await?;
        info!("Fetched {} speakers", speakers.len());

        let documents: Vec<_> = speakers
            .iter()
            .map(|s| self.renderer.speaker_document(s))
            .collect();
        let counts = processor.process(RecordKind::Speaker, &documents).await?;

        self.sync_log
            .record(&SyncLogEntry::success(
                target,
                speakers.len() as u64,
                counts,
                started_at,
                self.run_metadata(Some(mode), counts),
            ))
            .await?;

        info!(
            "Completed: Processing speakers (took {})",
            format_duration(timer.elapsed().as_secs_f64())
        );
        Ok(KindSummary::new(
            RecordKind::Speaker,
            speakers.len() as u64,
            counts,
        ))
    }

    fn run_metadata(&self, mode: Option<SyncMode>, counts: UpsertCounts) -> Value {
        json!({
            "incremental_mode": mode.is_some_and(|m| m.is_incremental()),
            "model": self.embedding_service.config().model_name(),
            "device": self.settings.device,
            "batch_size": self.settings.batch_size,
            "content_style": self.renderer.style().as_str(),
            "records_failed": counts.failed,
        })
    }
}
