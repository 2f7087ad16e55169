use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{DomainError, Embedding, EmbeddingDocument, RecordKind, SearchHit};

#[derive(Debug, Clone)]
struct StoredDocument {
    document: EmbeddingDocument,
    vector: Vec<f32>,
    writes: u32,
}

/// Keeps documents in memory. Used for dry runs and tests.
pub struct InMemoryVectorRepository {
    documents: Arc<Mutex<HashMap<(RecordKind, i64), StoredDocument>>>,
    fail_ids: HashSet<(RecordKind, i64)>,
}

impl InMemoryVectorRepository {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
            fail_ids: HashSet::new(),
        }
    }

    /// Make upserts of this record fail, to exercise per-record error handling.
    pub fn failing_on(mut self, kind: RecordKind, id: i64) -> Self {
        self.fail_ids.insert((kind, id));
        self
    }

    pub async fn get(&self, kind: RecordKind, id: i64) -> Option<EmbeddingDocument> {
        let store = self.documents.lock().await;
        store.get(&(kind, id)).map(|stored| stored.document.clone())
    }

    /// Number of times a record has been written.
    pub async fn write_count(&self, kind: RecordKind, id: i64) -> u32 {
        let store = self.documents.lock().await;
        store.get(&(kind, id)).map_or(0, |stored| stored.writes)
    }
}

impl Default for InMemoryVectorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn initialize(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn verify(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn target_name(&self, kind: RecordKind) -> String {
        format!("memory_{}", kind.plural())
    }

    async fn existing_ids(
        &self,
        kind: RecordKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        let store = self.documents.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| store.contains_key(&(kind, *id)))
            .collect())
    }

    async fn upsert(
        &self,
        document: &EmbeddingDocument,
        embedding: &Embedding,
    ) -> Result<(), DomainError> {
        let key = (document.kind(), document.id);
        if self.fail_ids.contains(&key) {
            return Err(DomainError::storage(format!(
                "Rejected {} {}",
                document.kind(),
                document.id
            )));
        }

        let mut store = self.documents.lock().await;
        let writes = store.get(&key).map_or(0, |stored| stored.writes) + 1;
        store.insert(
            key,
            StoredDocument {
                document: document.clone(),
                vector: embedding.vector().to_vec(),
                writes,
            },
        );

        debug!("Stored {} {} in memory", document.kind(), document.id);
        Ok(())
    }

    async fn search(
        &self,
        kind: RecordKind,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let store = self.documents.lock().await;

        let mut hits: Vec<SearchHit> = store
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, id), stored)| {
                SearchHit::new(
                    kind,
                    *id,
                    stored.document.content.clone(),
                    stored.document.metadata.clone(),
                    cosine_similarity(query_embedding, &stored.vector),
                )
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record_id().cmp(&b.record_id()))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, DomainError> {
        let store = self.documents.lock().await;
        Ok(store.keys().filter(|(k, _)| *k == kind).count() as u64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
