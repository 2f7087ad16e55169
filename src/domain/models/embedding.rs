use serde::{Deserialize, Serialize};

/// Represents a vector embedding for one rendered record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    record_id: i64,
    vector: Vec<f32>,
    model: String,
}

impl Embedding {
    pub fn new(record_id: i64, vector: Vec<f32>, model: String) -> Self {
        Self {
            record_id,
            vector,
            model,
        }
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Configuration for the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    model_name: String,
    dimensions: usize,
    max_sequence_length: usize,
    normalize: bool,
}

impl EmbeddingConfig {
    pub fn new(model_name: String, dimensions: usize, max_sequence_length: usize) -> Self {
        Self {
            model_name,
            dimensions,
            max_sequence_length,
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "mock-embedding".to_string(),
            dimensions: 768,
            max_sequence_length: 512,
            normalize: true,
        }
    }
}

/// Scales a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Checks that a batch holds one vector per input and every vector has the
/// expected width.
pub fn validate_embeddings(
    vectors: &[Vec<f32>],
    expected_count: usize,
    expected_dim: usize,
) -> Result<(), String> {
    if vectors.len() != expected_count {
        return Err(format!(
            "expected {} vectors, got {}",
            expected_count,
            vectors.len()
        ));
    }

    if let Some((index, bad)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != expected_dim)
    {
        return Err(format!(
            "vector {} has {} dimensions, expected {}",
            index,
            bad.len(),
            expected_dim
        ));
    }

    Ok(())
}
