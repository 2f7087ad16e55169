//! End-to-end sync runs against the in-memory adapters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;

use event_embeddings::application::{
    EmbeddingService, EventSource, SearchEmbeddingsUseCase, SyncEmbeddingsUseCase,
    SyncLogRepository, SyncSettings, VectorRepository, ERROR_TARGET,
};
use event_embeddings::domain::{
    ContentRenderer, ContentStyle, DomainError, EmbeddingConfig, IncrementalPolicy, RecordKind,
    SearchQuery, Session, Speaker, SyncLogEntry, SyncMode, SyncStatus, UpsertCounts,
};
use event_embeddings::{
    InMemoryEventSource, InMemorySyncLogRepository, InMemoryVectorRepository, MockEmbedding,
};

const DIMENSIONS: usize = 16;

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn sessions() -> Vec<Session> {
    let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    vec![
        Session::new(1, "Rust en producción")
            .with_date(day)
            .with_schedule(time(9, 0), time(10, 0))
            .with_location("Sala A - Centro de Convenciones")
            .with_event(10)
            .with_speaker(100, "Ana García", Some("Ingeniera de sistemas".to_string()))
            .with_tags(["rust", "backend"]),
        Session::new(2, "Bases de datos vectoriales")
            .with_date(day)
            .with_schedule(time(11, 0), time(12, 30))
            .with_event(10)
            .with_tags(["ia"]),
        Session::new(3, "Cierre").with_date(day),
    ]
}

fn speakers() -> Vec<Speaker> {
    vec![
        Speaker::new(100, "Ana García")
            .with_bio("Ingeniera de sistemas")
            .with_sessions(["Rust en producción"])
            .with_tags(["rust", "backend"]),
        Speaker::new(101, "Luis Pérez"),
    ]
}

fn settings(policy: IncrementalPolicy, batch_size: usize) -> SyncSettings {
    SyncSettings {
        policy,
        batch_size,
        show_progress: false,
        ..SyncSettings::default()
    }
}

struct TestEnv {
    source: Arc<InMemoryEventSource>,
    vectors: Arc<InMemoryVectorRepository>,
    sync_log: Arc<InMemorySyncLogRepository>,
}

impl TestEnv {
    fn new(vectors: InMemoryVectorRepository) -> Self {
        Self {
            source: Arc::new(InMemoryEventSource::new(sessions(), speakers())),
            vectors: Arc::new(vectors),
            sync_log: Arc::new(InMemorySyncLogRepository::new()),
        }
    }

    fn use_case(
        &self,
        embedding: Arc<dyn EmbeddingService>,
        settings: SyncSettings,
    ) -> SyncEmbeddingsUseCase {
        SyncEmbeddingsUseCase::new(
            self.source.clone(),
            self.vectors.clone(),
            self.sync_log.clone(),
            embedding,
            ContentRenderer::new(ContentStyle::Detailed),
            settings,
        )
    }
}

fn mock_embedding() -> Arc<dyn EmbeddingService> {
    Arc::new(MockEmbedding::with_dimensions(DIMENSIONS))
}

/// Returns vectors of the wrong width for any batch mentioning `marker`.
struct ShapeBreakingEmbedding {
    inner: MockEmbedding,
    marker: &'static str,
}

#[async_trait]
impl EmbeddingService for ShapeBreakingEmbedding {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            return Ok(texts.iter().map(|_| vec![0.5; 3]).collect());
        }
        self.inner.embed_texts(texts).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        self.inner.embed_query(query).await
    }

    fn config(&self) -> &EmbeddingConfig {
        self.inner.config()
    }
}

/// Serves the fixture data and remembers the `since` of every session fetch.
struct RecordingEventSource {
    inner: InMemoryEventSource,
    requested_since: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl RecordingEventSource {
    fn new() -> Self {
        Self {
            inner: InMemoryEventSource::new(sessions(), speakers()),
            requested_since: Mutex::new(Vec::new()),
        }
    }

    async fn requested_since(&self) -> Vec<Option<DateTime<Utc>>> {
        self.requested_since.lock().await.clone()
    }
}

#[async_trait]
impl EventSource for RecordingEventSource {
    async fn fetch_sessions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, DomainError> {
        self.requested_since.lock().await.push(since);
        self.inner.fetch_sessions(since).await
    }

    async fn fetch_speakers(&self) -> Result<Vec<Speaker>, DomainError> {
        self.inner.fetch_speakers().await
    }

    fn supports_incremental(&self) -> bool {
        true
    }
}

struct BrokenEmbedding {
    config: EmbeddingConfig,
}

#[async_trait]
impl EmbeddingService for BrokenEmbedding {
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        Err(DomainError::embedding("model backend crashed"))
    }

    async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, DomainError> {
        Err(DomainError::embedding("model backend crashed"))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[tokio::test]
async fn test_first_run_is_full_and_inserts_everything() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 2))
        .execute()
        .await
        .expect("sync should succeed");

    assert_eq!(summary.mode, SyncMode::Full);
    assert_eq!(summary.sessions.processed, 3);
    assert_eq!(summary.sessions.counts.inserted, 3);
    assert_eq!(summary.sessions.counts.updated, 0);
    assert_eq!(summary.speakers.processed, 2);
    assert_eq!(summary.speakers.counts.inserted, 2);
    assert_eq!(summary.total_failed(), 0);

    let stored = env
        .vectors
        .get(RecordKind::Session, 1)
        .await
        .expect("session 1 stored");
    assert!(stored.content.contains("Rust en producción"));
    assert!(stored.content.contains("Ana García"));

    let entries = env.sync_log.entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == SyncStatus::Success));
    assert_eq!(entries[0].table_name, "memory_sessions");
    assert_eq!(entries[0].records_processed, 3);
    assert_eq!(entries[0].records_inserted, 3);
    assert_eq!(entries[1].table_name, "memory_speakers");
    assert_eq!(entries[0].metadata["incremental_mode"], false);
    assert_eq!(entries[0].metadata["batch_size"], 2);
}

#[tokio::test]
async fn test_second_auto_run_is_incremental_and_updates() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    env.use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .expect("first sync should succeed");

    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .expect("second sync should succeed");

    assert_eq!(summary.mode, SyncMode::Incremental);
    assert_eq!(summary.sessions.counts.inserted, 0);
    assert_eq!(summary.sessions.counts.updated, 3);
    assert_eq!(summary.speakers.counts.inserted, 0);
    assert_eq!(summary.speakers.counts.updated, 2);
    assert_eq!(env.vectors.write_count(RecordKind::Session, 2).await, 2);
    assert_eq!(env.vectors.count(RecordKind::Session).await.unwrap(), 3);

    let successes = env
        .sync_log
        .count_successful("memory_sessions")
        .await
        .unwrap();
    assert_eq!(successes, 2);
    let entries = env.sync_log.entries().await;
    assert_eq!(entries[2].metadata["incremental_mode"], true);
}

#[tokio::test]
async fn test_full_policy_ignores_previous_runs() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    env.use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .unwrap();

    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Never, 32))
        .execute()
        .await
        .unwrap();

    assert_eq!(summary.mode, SyncMode::Full);
    assert_eq!(summary.sessions.counts.updated, 3);
}

#[tokio::test]
async fn test_new_records_between_runs_are_inserted() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    env.use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .unwrap();

    let mut grown = sessions();
    grown.push(Session::new(4, "Taller de embeddings"));
    env.source.set_sessions(grown).await;

    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .unwrap();

    assert_eq!(summary.sessions.processed, 4);
    assert_eq!(summary.sessions.counts.inserted, 1);
    assert_eq!(summary.sessions.counts.updated, 3);
}

#[tokio::test]
async fn test_wrong_shape_batch_is_skipped() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    let embedding = Arc::new(ShapeBreakingEmbedding {
        inner: MockEmbedding::with_dimensions(DIMENSIONS),
        marker: "Bases de datos vectoriales",
    });

    // Batches of one: only the batch holding session 2 breaks.
    let summary = env
        .use_case(embedding, settings(IncrementalPolicy::Auto, 1))
        .execute()
        .await
        .expect("a bad batch does not abort the run");

    assert_eq!(summary.sessions.counts.inserted, 2);
    assert_eq!(summary.sessions.counts.failed, 1);
    assert!(env.vectors.get(RecordKind::Session, 2).await.is_none());
    assert_eq!(summary.speakers.counts.inserted, 2);

    let entries = env.sync_log.entries().await;
    assert_eq!(entries[0].metadata["records_failed"], 1);
}

#[tokio::test]
async fn test_failing_upsert_only_fails_its_record() {
    let env = TestEnv::new(InMemoryVectorRepository::new().failing_on(RecordKind::Speaker, 100));

    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .expect("a failed upsert does not abort the run");

    assert_eq!(summary.sessions.counts.inserted, 3);
    assert_eq!(summary.speakers.counts.inserted, 1);
    assert_eq!(summary.speakers.counts.failed, 1);
    assert!(env.vectors.get(RecordKind::Speaker, 101).await.is_some());
    assert!(env.vectors.get(RecordKind::Speaker, 100).await.is_none());
}

#[tokio::test]
async fn test_embedding_failure_logs_error_and_propagates() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    let embedding = Arc::new(BrokenEmbedding {
        config: EmbeddingConfig::new("broken".to_string(), DIMENSIONS, 512),
    });

    let result = env
        .use_case(embedding, settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await;

    let err = result.expect_err("embedding failure aborts the run");
    assert!(matches!(err, DomainError::EmbeddingError(_)));

    let entries = env.sync_log.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].table_name, ERROR_TARGET);
    assert_eq!(entries[0].status, SyncStatus::Error);
    assert!(entries[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("model backend crashed"));

    // An errored run is not a checkpoint.
    let successes = env
        .sync_log
        .count_successful("memory_sessions")
        .await
        .unwrap();
    assert_eq!(successes, 0);
}

#[tokio::test]
async fn test_empty_source_still_logs_success() {
    let env = TestEnv {
        source: Arc::new(InMemoryEventSource::default()),
        vectors: Arc::new(InMemoryVectorRepository::new()),
        sync_log: Arc::new(InMemorySyncLogRepository::new()),
    };

    let summary = env
        .use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .unwrap();

    assert_eq!(summary.sessions.processed, 0);
    assert_eq!(summary.speakers.processed, 0);

    let entries = env.sync_log.entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.is_success()));
}

#[tokio::test]
async fn test_search_finds_synced_session() {
    let env = TestEnv::new(InMemoryVectorRepository::new());
    env.use_case(mock_embedding(), settings(IncrementalPolicy::Auto, 32))
        .execute()
        .await
        .unwrap();

    let target = &sessions()[1];
    let content = ContentRenderer::new(ContentStyle::Detailed).render_session(target);

    let search = SearchEmbeddingsUseCase::new(env.vectors.clone(), mock_embedding());
    let hits = search
        .execute(SearchQuery::new(content, RecordKind::Session).with_limit(2))
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record_id(), 2);
    assert!(hits[0].score() > 0.99);
}

#[tokio::test]
async fn test_checkpoint_comes_from_last_session_success() {
    let source = Arc::new(RecordingEventSource::new());
    let vectors = Arc::new(InMemoryVectorRepository::new());
    let sync_log = Arc::new(InMemorySyncLogRepository::new());

    let run = |policy: IncrementalPolicy| {
        SyncEmbeddingsUseCase::new(
            source.clone(),
            vectors.clone(),
            sync_log.clone(),
            mock_embedding(),
            ContentRenderer::new(ContentStyle::Detailed),
            settings(policy, 32),
        )
    };

    let first = run(IncrementalPolicy::Auto).execute().await.unwrap();
    assert_eq!(first.mode, SyncMode::Full);
    assert_eq!(source.requested_since().await, vec![None]);

    let first_success = sync_log
        .last_successful_sync("memory_sessions")
        .await
        .unwrap()
        .expect("first run logged a session success");

    let second = run(IncrementalPolicy::Auto).execute().await.unwrap();
    assert_eq!(second.mode, SyncMode::Incremental);

    // The first run is inside the 24 h lookback, so it is the later bound.
    assert_eq!(
        source.requested_since().await,
        vec![None, Some(first_success)]
    );

    run(IncrementalPolicy::Never).execute().await.unwrap();
    assert_eq!(source.requested_since().await.last(), Some(&None));
}

#[tokio::test]
async fn test_stale_checkpoint_is_clamped_to_lookback_window() {
    let source = Arc::new(RecordingEventSource::new());
    let sync_log = Arc::new(InMemorySyncLogRepository::new());

    let mut stale = SyncLogEntry::success(
        "memory_sessions",
        1,
        UpsertCounts::default(),
        Utc::now(),
        serde_json::Value::Null,
    );
    stale.sync_timestamp = Utc::now() - chrono::Duration::days(30);
    sync_log.record(&stale).await.unwrap();

    let before = Utc::now();
    SyncEmbeddingsUseCase::new(
        source.clone(),
        Arc::new(InMemoryVectorRepository::new()),
        sync_log.clone(),
        mock_embedding(),
        ContentRenderer::new(ContentStyle::Detailed),
        settings(IncrementalPolicy::Auto, 32),
    )
    .execute()
    .await
    .unwrap();
    let after = Utc::now();

    let requested = source.requested_since().await;
    let since = requested[0].expect("incremental run passes a checkpoint");
    let lookback = chrono::Duration::hours(24);
    assert!(since >= before - lookback && since <= after - lookback);
}
