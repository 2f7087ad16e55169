use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{DomainError, Embedding, EmbeddingDocument, RecordKind, SearchHit};

/// Destination store for embedded documents, keyed by record kind and id.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Create whatever schema the store needs. Idempotent.
    async fn initialize(&self) -> Result<(), DomainError>;

    /// Check that the schema the store writes to exists.
    async fn verify(&self) -> Result<(), DomainError>;

    /// Name the sync log records runs for this kind under.
    fn target_name(&self, kind: RecordKind) -> String;

    /// The subset of `ids` already stored for `kind`.
    async fn existing_ids(
        &self,
        kind: RecordKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError>;

    /// Insert the document, or replace content, embedding and metadata of the
    /// stored one with the same kind and id.
    async fn upsert(
        &self,
        document: &EmbeddingDocument,
        embedding: &Embedding,
    ) -> Result<(), DomainError>;

    async fn search(
        &self,
        kind: RecordKind,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;

    async fn count(&self, kind: RecordKind) -> Result<u64, DomainError>;
}
