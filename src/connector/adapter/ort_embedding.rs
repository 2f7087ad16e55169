use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::application::EmbeddingService;
use crate::domain::{l2_normalize, DomainError, EmbeddingConfig};

/// How token vectors are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    Mean,
    Cls,
}

/// Subset of sentence-transformers' `1_Pooling/config.json`.
#[derive(Debug, Default, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
}

impl Pooling {
    fn from_config(json: &str) -> Self {
        match serde_json::from_str::<PoolingConfig>(json) {
            Ok(config) if config.pooling_mode_cls_token => Pooling::Cls,
            _ => Pooling::Mean,
        }
    }
}

/// Sentence-transformers model run through ONNX Runtime on the CPU.
pub struct OrtEmbedding {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    config: EmbeddingConfig,
    pooling: Pooling,
    uses_token_type_ids: bool,
}

impl OrtEmbedding {
    /// Downloads (or reuses from `cache_dir`) the model named in `config`.
    pub fn new(config: EmbeddingConfig, cache_dir: &Path, device: &str) -> Result<Self, DomainError> {
        let model_id = config.model_name().to_string();
        info!("Loading embedding model: {}", model_id);

        if device != "cpu" {
            warn!(
                "Device '{}' requested but ONNX Runtime is running on cpu",
                device
            );
        }

        let api = hf_hub::api::sync::ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .with_progress(true)
            .build()
            .map_err(|e| DomainError::embedding(format!("Failed to create HF API: {}", e)))?;

        let repo = api.model(model_id.clone());

        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| DomainError::embedding(format!("Failed to download tokenizer: {}", e)))?;

        let model_path = repo
            .get("model.onnx")
            .or_else(|_| repo.get("onnx/model.onnx"))
            .map_err(|e| DomainError::embedding(format!("Failed to download ONNX model: {}", e)))?;

        let pooling = repo
            .get("1_Pooling/config.json")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|json| Pooling::from_config(&json))
            .unwrap_or(Pooling::Mean);

        Self::from_paths(model_path, tokenizer_path, config, pooling)
    }

    pub fn from_paths(
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        config: EmbeddingConfig,
        pooling: Pooling,
    ) -> Result<Self, DomainError> {
        info!("Loading ONNX model from: {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| DomainError::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DomainError::embedding(format!("Failed to set optimization level: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| DomainError::embedding(format!("Failed to load ONNX model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| DomainError::embedding(format!("Failed to load tokenizer: {}", e)))?;

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        info!(
            "Model loaded: {} ({} dims, {:?} pooling, normalize: {})",
            config.model_name(),
            config.dimensions(),
            pooling,
            config.normalize()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            config,
            pooling,
            uses_token_type_ids,
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| DomainError::embedding(format!("Tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.config.max_sequence_length());

        let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut token_type_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            let padding = max_len - len;

            input_ids.extend(encoding.get_ids()[..len].iter().map(|&x| x as i64));
            attention_mask.extend(encoding.get_attention_mask()[..len].iter().map(|&x| x as i64));
            token_type_ids.extend(encoding.get_type_ids()[..len].iter().map(|&x| x as i64));

            input_ids.extend(std::iter::repeat_n(0i64, padding));
            attention_mask.extend(std::iter::repeat_n(0i64, padding));
            token_type_ids.extend(std::iter::repeat_n(0i64, padding));
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| DomainError::embedding(format!("Failed to create input_ids tensor: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| DomainError::embedding(format!("Failed to create attention_mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| DomainError::embedding(format!("Failed to lock session: {}", e)))?;

        let outputs = if self.uses_token_type_ids {
            let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids)).map_err(|e| {
                DomainError::embedding(format!("Failed to create token_type_ids tensor: {}", e))
            })?;
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            ])
        }
        .map_err(|e| DomainError::embedding(format!("Inference failed: {}", e)))?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| DomainError::embedding("No output tensor found"))?;

        let (output_shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| DomainError::embedding(format!("Failed to extract output tensor: {}", e)))?;

        let output_shape: Vec<usize> = output_shape.iter().map(|&x| x as usize).collect();
        debug!("Output tensor shape: {:?}", output_shape);

        let mut embeddings = match output_shape.as_slice() {
            [_, seq_len, hidden] => (0..batch_size)
                .map(|i| {
                    let mask = &attention_mask[i * max_len..(i + 1) * max_len];
                    pool_tokens(data, i, *seq_len, *hidden, mask, self.pooling)
                })
                .collect::<Vec<_>>(),
            [_, hidden] => (0..batch_size)
                .map(|i| data[i * hidden..(i + 1) * hidden].to_vec())
                .collect(),
            other => {
                return Err(DomainError::embedding(format!(
                    "Unexpected output tensor shape: {:?}",
                    other
                )))
            }
        };

        if self.config.normalize() {
            embeddings.iter_mut().for_each(|v| l2_normalize(v));
        }

        Ok(embeddings)
    }
}

/// Reduces one sequence of a `[batch, seq, hidden]` tensor to a vector.
fn pool_tokens(
    data: &[f32],
    index: usize,
    seq_len: usize,
    hidden: usize,
    mask: &[i64],
    pooling: Pooling,
) -> Vec<f32> {
    let offset = index * seq_len * hidden;

    match pooling {
        Pooling::Cls => data[offset..offset + hidden].to_vec(),
        Pooling::Mean => {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;

            for (j, &m) in mask.iter().enumerate().take(seq_len) {
                if m == 0 {
                    continue;
                }
                let token = &data[offset + j * hidden..offset + (j + 1) * hidden];
                for (acc, value) in pooled.iter_mut().zip(token) {
                    *acc += value;
                }
                count += 1.0;
            }

            if count > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= count);
            }
            pooled
        }
    }
}

#[async_trait]
impl EmbeddingService for OrtEmbedding {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.run_batch(&refs)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        self.run_batch(&[query])?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("Failed to generate query embedding"))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooling_from_config() {
        assert_eq!(
            Pooling::from_config(r#"{"word_embedding_dimension": 768, "pooling_mode_cls_token": true}"#),
            Pooling::Cls
        );
        assert_eq!(
            Pooling::from_config(r#"{"pooling_mode_mean_tokens": true}"#),
            Pooling::Mean
        );
        assert_eq!(Pooling::from_config("not json"), Pooling::Mean);
    }

    #[test]
    fn test_mean_pooling_ignores_padding() {
        // batch of 1, 3 tokens, hidden 2; last token is padding
        let data = [1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let pooled = pool_tokens(&data, 0, 3, 2, &[1, 1, 0], Pooling::Mean);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_cls_pooling_takes_first_token() {
        let data = [0.0, 0.0, 0.0, 0.0, 5.0, 6.0, 7.0, 8.0];
        let pooled = pool_tokens(&data, 1, 2, 2, &[1, 1], Pooling::Cls);
        assert_eq!(pooled, vec![5.0, 6.0]);
    }

    #[tokio::test]
    #[ignore = "Requires model download"]
    async fn test_ort_embedding_service() {
        let cache = std::env::temp_dir().join("event-embeddings-test-cache");
        let config = EmbeddingConfig::new(
            "sentence-transformers/multi-qa-mpnet-base-dot-v1".to_string(),
            768,
            512,
        );
        let service = OrtEmbedding::new(config, &cache, "cpu").expect("Failed to create service");

        let embedding = service
            .embed_query("Sesión: Async Rust en producción")
            .await
            .unwrap();

        assert_eq!(embedding.len(), 768);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }
}
