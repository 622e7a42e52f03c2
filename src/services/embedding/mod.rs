//! Embedding provider abstraction.
//!
//! One backend is chosen from configuration at startup. The service pads
//! every raw vector with trailing zeros to the configured dimension and
//! rejects vectors that are already longer.

mod afs;
mod local;
mod ollama;
mod openai;

pub use afs::AfsEmbedding;
pub(crate) use afs::{AFS_HOST_HEADER, AFS_HOST_VALUE, AFS_KEY_HEADER};
pub use local::LocalEmbedding;
pub use ollama::OllamaEmbedding;
pub use openai::OpenAiEmbedding;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info};

use crate::error::{ConfigError, EmbeddingError};
use crate::models::{EmbeddingBackendKind, EmbeddingConfig, MIN_VECTOR_DIMENSION};

/// A single embedding provider. Returns the provider's raw vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Pad `raw` to exactly `dimension` values with trailing zeros.
pub fn pad_to_dimension(mut raw: Vec<f32>, dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    if dimension < MIN_VECTOR_DIMENSION || raw.len() > dimension {
        return Err(EmbeddingError::Dimension {
            actual: raw.len(),
            configured: dimension,
        });
    }
    raw.resize(dimension, 0.0);
    Ok(raw)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConfigError::ValidationError(format!("failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into `ProviderUnavailable`, keeping the status in
/// the message so the retry policy can classify it.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, EmbeddingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EmbeddingError::ProviderUnavailable(format!(
        "status {}: {}",
        status.as_u16(),
        body
    )))
}

pub(crate) fn parse_json(body: &str) -> Result<serde_json::Value, EmbeddingError> {
    serde_json::from_str(body)
        .map_err(|e| EmbeddingError::ProviderResponse(format!("response is not JSON: {}", e)))
}

/// Read a JSON array of numbers, rejecting missing or empty vectors.
pub(crate) fn vector_field(
    value: Option<&serde_json::Value>,
    path: &str,
) -> Result<Vec<f32>, EmbeddingError> {
    let values = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| EmbeddingError::ProviderResponse(format!("missing field {}", path)))?;

    let vector = values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| EmbeddingError::ProviderResponse(format!("non-numeric value in {}", path)))?;

    if vector.is_empty() {
        return Err(EmbeddingError::ProviderResponse(format!("empty {}", path)));
    }
    Ok(vector)
}

/// Build the backend named by `config.backend`, failing fast on missing settings.
pub fn create_backend(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>, ConfigError> {
    let backend: Arc<dyn EmbeddingBackend> = match config.backend {
        EmbeddingBackendKind::Afs => Arc::new(AfsEmbedding::initialize(config)?),
        EmbeddingBackendKind::Ollama => Arc::new(OllamaEmbedding::initialize(config)?),
        EmbeddingBackendKind::OpenAi => Arc::new(OpenAiEmbedding::initialize(config)?),
        EmbeddingBackendKind::Local => Arc::new(LocalEmbedding::initialize(config)?),
    };
    Ok(backend)
}

/// Embedding entry point used by the pipeline.
pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    dimension: usize,
}

impl EmbeddingService {
    pub fn initialize(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        if config.dimension < MIN_VECTOR_DIMENSION {
            return Err(ConfigError::Dimension {
                dimension: config.dimension,
                minimum: MIN_VECTOR_DIMENSION,
            });
        }
        let backend = create_backend(config)?;
        info!(
            backend = backend.name(),
            dimension = config.dimension,
            "embedding backend initialized"
        );
        Ok(Self {
            backend,
            dimension: config.dimension,
        })
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(
        backend: Arc<dyn EmbeddingBackend>,
        dimension: usize,
    ) -> Result<Self, ConfigError> {
        if dimension < MIN_VECTOR_DIMENSION {
            return Err(ConfigError::Dimension {
                dimension,
                minimum: MIN_VECTOR_DIMENSION,
            });
        }
        Ok(Self { backend, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Embed `text` into a vector of exactly `dimension` values.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let raw = self.backend.embed(text).await?;
        debug!(
            backend = self.backend.name(),
            raw_len = raw.len(),
            dimension = self.dimension,
            "embedded text"
        );
        pad_to_dimension(raw, self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedBackend(Vec<f32>);

    #[async_trait]
    impl EmbeddingBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_pad_to_dimension() {
        let padded = pad_to_dimension(vec![1.0, 2.0, 3.0], 8).unwrap();
        assert_eq!(padded.len(), 8);
        assert_eq!(&padded[..3], &[1.0, 2.0, 3.0]);
        assert!(padded[3..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pad_exact_length_unchanged() {
        let raw: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(pad_to_dimension(raw.clone(), 8).unwrap(), raw);
    }

    #[test]
    fn test_pad_rejects_longer_vector() {
        let err = pad_to_dimension(vec![0.5; 9], 8).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Dimension {
                actual: 9,
                configured: 8
            }
        ));
    }

    #[test]
    fn test_pad_rejects_small_dimension() {
        assert!(matches!(
            pad_to_dimension(vec![1.0], 7),
            Err(EmbeddingError::Dimension { configured: 7, .. })
        ));
    }

    #[test]
    fn test_vector_field() {
        let body = json!({"embedding": [0.25, -1, 2.5]});
        assert_eq!(
            vector_field(body.get("embedding"), "embedding").unwrap(),
            vec![0.25, -1.0, 2.5]
        );
        assert!(matches!(
            vector_field(body.get("missing"), "missing"),
            Err(EmbeddingError::ProviderResponse(_))
        ));
        let empty = json!({"embedding": []});
        assert!(vector_field(empty.get("embedding"), "embedding").is_err());
        let bad = json!({"embedding": ["x"]});
        assert!(vector_field(bad.get("embedding"), "embedding").is_err());
    }

    #[tokio::test]
    async fn test_service_pads_backend_output() {
        let service =
            EmbeddingService::with_backend(Arc::new(FixedBackend(vec![1.0; 5])), 16).unwrap();
        let vector = service.embed("anything").await.unwrap();
        assert_eq!(vector.len(), 16);
        assert_eq!(vector.iter().filter(|v| **v == 0.0).count(), 11);
    }

    #[tokio::test]
    async fn test_service_rejects_oversized_output() {
        let service =
            EmbeddingService::with_backend(Arc::new(FixedBackend(vec![1.0; 17])), 16).unwrap();
        assert!(matches!(
            service.embed("anything").await,
            Err(EmbeddingError::Dimension { .. })
        ));
    }

    #[test]
    fn test_service_rejects_small_dimension() {
        assert!(matches!(
            EmbeddingService::with_backend(Arc::new(FixedBackend(vec![])), 4),
            Err(ConfigError::Dimension { .. })
        ));

        let config = EmbeddingConfig {
            dimension: 4,
            ..Default::default()
        };
        assert!(matches!(
            EmbeddingService::initialize(&config),
            Err(ConfigError::Dimension { .. })
        ));
    }
}
