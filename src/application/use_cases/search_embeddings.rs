use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::application::{EmbeddingService, VectorRepository};
use crate::domain::{DomainError, SearchHit, SearchQuery};

pub struct SearchEmbeddingsUseCase {
    vector_repo: Arc<dyn VectorRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
}

impl SearchEmbeddingsUseCase {
    pub fn new(
        vector_repo: Arc<dyn VectorRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            vector_repo,
            embedding_service,
        }
    }

    pub async fn execute(&self, query: SearchQuery) -> Result<Vec<SearchHit>, DomainError> {
        info!("Searching {} embeddings for: {}", query.kind(), query.query());
        let start_time = Instant::now();

        let query_embedding = self.embedding_service.embed_query(query.query()).await?;
        let mut hits = self
            .vector_repo
            .search(query.kind(), &query_embedding, query.limit())
            .await?;

        if let Some(min_score) = query.min_score() {
            hits.retain(|hit| hit.is_relevant(min_score));
        }

        info!(
            "Found {} results in {:.2}s",
            hits.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(hits)
    }
}
