use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};

use crate::application::{EmbeddingService, VectorRepository};
use crate::domain::{
    validate_embeddings, DomainError, Embedding, EmbeddingDocument, RecordKind, UpsertCounts,
};

/// Embeds rendered documents in batches and upserts them, keeping
/// insert/update accounting.
pub struct RecordProcessor {
    vector_repo: Arc<dyn VectorRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    batch_size: usize,
    show_progress: bool,
}

impl RecordProcessor {
    pub fn new(
        vector_repo: Arc<dyn VectorRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
        batch_size: usize,
    ) -> Self {
        Self {
            vector_repo,
            embedding_service,
            batch_size: batch_size.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Process every document of one kind.
    ///
    /// A batch whose embeddings come back with the wrong shape is skipped and
    /// a failing upsert only fails its own record; both count as `failed`.
    /// Errors from the embedding backend or the existing-id lookup abort.
    pub async fn process(
        &self,
        kind: RecordKind,
        documents: &[EmbeddingDocument],
    ) -> Result<UpsertCounts, DomainError> {
        if documents.is_empty() {
            info!("No {} to process", kind.plural());
            return Ok(UpsertCounts::default());
        }

        info!("Processing {} {}...", documents.len(), kind.plural());

        let ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
        let mut existing = self.vector_repo.existing_ids(kind, &ids).await?;
        debug!("{} of {} {} already stored", existing.len(), ids.len(), kind.plural());

        let config = self.embedding_service.config();
        let expected_dim = config.dimensions();
        let model = config.model_name().to_string();

        let mut tracker = ProgressTracker::new(
            documents.len() as u64,
            format!("Generating {} embeddings", kind),
            self.show_progress,
        );
        let mut counts = UpsertCounts::default();

        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = self.embedding_service.embed_texts(&texts).await?;

            if let Err(reason) = validate_embeddings(&vectors, batch.len(), expected_dim) {
                error!("Invalid embeddings shape for {} batch: {}", kind, reason);
                counts.failed += batch.len() as u64;
                tracker.update(batch.len() as u64);
                continue;
            }

            for (document, vector) in batch.iter().zip(vectors) {
                let embedding = Embedding::new(document.id, vector, model.clone());
                match self.vector_repo.upsert(document, &embedding).await {
                    Ok(()) => {
                        // A repeated id later in the same run is an update.
                        if existing.insert(document.id) {
                            counts.inserted += 1;
                        } else {
                            counts.updated += 1;
                        }
                    }
                    Err(e) => {
                        error!("Error processing {} {}: {}", kind, document.id, e);
                        counts.failed += 1;
                    }
                }
            }

            tracker.update(batch.len() as u64);
        }

        tracker.finish();

        info!(
            "{} processed - Inserted: {}, Updated: {}, Failed: {}",
            kind.plural(),
            counts.inserted,
            counts.updated,
            counts.failed
        );

        Ok(counts)
    }
}

/// Progress bar on the terminal plus a log line every ten percent.
struct ProgressTracker {
    total: u64,
    current: u64,
    desc: String,
    started: Instant,
    last_logged_percent: u64,
    bar: ProgressBar,
}

impl ProgressTracker {
    fn new(total: u64, desc: String, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_message(desc.clone());
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            total,
            current: 0,
            desc,
            started: Instant::now(),
            last_logged_percent: 0,
            bar,
        }
    }

    fn update(&mut self, n: u64) {
        self.current = (self.current + n).min(self.total);
        self.bar.set_position(self.current);

        if self.total == 0 {
            return;
        }

        let percent = self.current * 100 / self.total;
        if percent >= self.last_logged_percent + 10 {
            let elapsed = self.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                self.current as f64 / elapsed
            } else {
                0.0
            };
            let eta = if rate > 0.0 {
                (self.total - self.current) as f64 / rate
            } else {
                0.0
            };
            info!(
                "{}: {}/{} ({}%) - Rate: {:.1} items/s - ETA: {:.0}s",
                self.desc, self.current, self.total, percent, rate, eta
            );
            self.last_logged_percent = percent / 10 * 10;
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.total as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "{}: Completed {} items in {:.1}s ({:.1} items/s)",
            self.desc, self.total, elapsed, rate
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::{InMemoryVectorRepository, MockEmbedding};
    use crate::domain::{ContentRenderer, ContentStyle, Session};

    fn documents(ids: &[i64]) -> Vec<EmbeddingDocument> {
        let renderer = ContentRenderer::new(ContentStyle::Detailed);
        ids.iter()
            .map(|id| renderer.session_document(&Session::new(*id, format!("Sesión {}", id))))
            .collect()
    }

    fn processor(repo: Arc<InMemoryVectorRepository>, batch_size: usize) -> RecordProcessor {
        RecordProcessor::new(repo, Arc::new(MockEmbedding::with_dimensions(8)), batch_size)
            .with_progress(false)
    }

    #[tokio::test]
    async fn test_counts_inserts_then_updates() {
        let repo = Arc::new(InMemoryVectorRepository::new());
        let processor = processor(repo.clone(), 2);

        let first = processor
            .process(RecordKind::Session, &documents(&[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(first, UpsertCounts { inserted: 3, updated: 0, failed: 0 });

        let second = processor
            .process(RecordKind::Session, &documents(&[2, 3, 4]))
            .await
            .unwrap();
        assert_eq!(second, UpsertCounts { inserted: 1, updated: 2, failed: 0 });
    }

    #[tokio::test]
    async fn test_repeated_id_in_one_run_is_an_update() {
        let repo = Arc::new(InMemoryVectorRepository::new());
        let counts = processor(repo.clone(), 10)
            .process(RecordKind::Session, &documents(&[5, 5]))
            .await
            .unwrap();

        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 1, failed: 0 });
        assert_eq!(repo.write_count(RecordKind::Session, 5).await, 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let repo = Arc::new(InMemoryVectorRepository::new());
        let counts = processor(repo, 4)
            .process(RecordKind::Session, &[])
            .await
            .unwrap();
        assert_eq!(counts, UpsertCounts::default());
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        let repo = Arc::new(InMemoryVectorRepository::new());
        assert_eq!(processor(repo, 0).batch_size(), 1);
    }
}
