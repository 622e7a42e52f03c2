//! In-process ONNX embedding backend.
//!
//! Expects `model.onnx` and `tokenizer.json` in the configured model
//! directory. Inference is blocking and runs on the blocking thread pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{TruncationParams, TruncationStrategy};

use super::EmbeddingBackend;
use crate::error::{ConfigError, EmbeddingError};
use crate::models::EmbeddingConfig;

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    output_dimension: Option<usize>,
}

pub struct LocalEmbedding {
    model: Arc<OnnxModel>,
}

impl LocalEmbedding {
    pub fn initialize(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let model_dir = config
            .local
            .model_dir
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("LOCAL_EMBEDDING_MODEL_DIR".to_string()))?;

        let model = OnnxModel::load(
            model_dir,
            config.local.max_tokens as usize,
            config.local.output_dimension,
        )?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl OnnxModel {
    fn load(
        model_dir: &Path,
        max_tokens: usize,
        output_dimension: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ConfigError::PathError(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let load_error = |e: ort::Error| ConfigError::ValidationError(e.to_string());
        let session = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?
            .with_intra_threads(num_cpus())
            .map_err(load_error)?
            .commit_from_file(&model_path)
            .map_err(load_error)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ConfigError::ValidationError(format!("tokenizer: {}", e)))?;

        // Truncate long fragments instead of running out of memory
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ConfigError::ValidationError(format!("tokenizer: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            output_dimension,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;

        let seq_len = encoding.get_ids().len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let position_ids: Vec<i64> = (0..seq_len as i64).collect();

        let inference_error = |e: ort::Error| EmbeddingError::ModelError(e.to_string());
        let input_ids = Tensor::from_array(([1, seq_len], input_ids)).map_err(inference_error)?;
        let attention_mask =
            Tensor::from_array(([1, seq_len], attention_mask)).map_err(inference_error)?;
        let position_ids =
            Tensor::from_array(([1, seq_len], position_ids)).map_err(inference_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::ModelError("session lock poisoned".to_string()))?;

        let wants_positions = session.inputs.len() >= 3;
        let outputs = if wants_positions {
            session.run(ort::inputs![input_ids, attention_mask, position_ids])
        } else {
            session.run(ort::inputs![input_ids, attention_mask])
        }
        .map_err(inference_error)?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let pooled = pool_last_token(&dims, data)?;
        let width = self
            .output_dimension
            .map_or(pooled.len(), |d| d.min(pooled.len()));
        Ok(normalize(&pooled[..width]))
    }
}

/// Hidden state of the last token (`[1, seq, hidden]`) or the pooled
/// output (`[1, hidden]`).
fn pool_last_token(dims: &[usize], data: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    let range = match dims {
        [1, seq, hidden] if *seq > 0 => (seq - 1) * hidden..seq * hidden,
        [1, hidden] => 0..*hidden,
        _ => {
            return Err(EmbeddingError::ModelError(format!(
                "unexpected output shape: {:?}",
                dims
            )));
        }
    };
    data.get(range)
        .map(<[f32]>::to_vec)
        .ok_or_else(|| EmbeddingError::ModelError("output shorter than its shape".to_string()))
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[async_trait]
impl EmbeddingBackend for LocalEmbedding {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || model.embed(&text))
            .await
            .map_err(|e| EmbeddingError::ModelError(format!("task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_requires_model_dir() {
        let config = EmbeddingConfig::default();
        assert!(matches!(
            LocalEmbedding::initialize(&config),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_initialize_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EmbeddingConfig::default();
        config.local.model_dir = Some(dir.path().to_path_buf());
        assert!(matches!(
            LocalEmbedding::initialize(&config),
            Err(ConfigError::PathError(_))
        ));
    }

    #[test]
    fn test_pool_last_token() {
        // two tokens, hidden size 3
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(pool_last_token(&[1, 2, 3], &data).unwrap(), vec![4.0, 5.0, 6.0]);
        assert_eq!(pool_last_token(&[1, 3], &data).unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(pool_last_token(&[2, 2, 3], &data).is_err());
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
