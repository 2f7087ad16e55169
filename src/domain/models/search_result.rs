use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordKind;

/// A stored document returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    kind: RecordKind,
    record_id: i64,
    content: String,
    metadata: Value,
    score: f32,
}

impl SearchHit {
    pub fn new(
        kind: RecordKind,
        record_id: i64,
        content: String,
        metadata: Value,
        score: f32,
    ) -> Self {
        Self {
            kind,
            record_id,
            content,
            metadata,
            score,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.score >= threshold
    }

    pub fn display_line(&self) -> String {
        format!("{} #{} (score: {:.3})", self.kind, self.record_id, self.score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    query: String,
    kind: RecordKind,
    limit: usize,
    min_score: Option<f32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            query: query.into(),
            kind,
            limit: 10,
            min_score: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        // Ensure at least 1 result is requested
        self.limit = limit.max(1);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn min_score(&self) -> Option<f32> {
        self.min_score
    }
}
