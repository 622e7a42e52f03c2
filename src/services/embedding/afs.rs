//! Hosted inference API (AFS) embedding backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{EmbeddingBackend, ensure_success, http_client, parse_json, vector_field};
use crate::error::{ConfigError, EmbeddingError};
use crate::models::{EmbeddingConfig, require};

pub(crate) const AFS_HOST_HEADER: &str = "X-API-HOST";
pub(crate) const AFS_HOST_VALUE: &str = "afs-inference";
pub(crate) const AFS_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Serialize)]
struct AfsEmbeddingRequest<'a> {
    model: &'a str,
    inputs: [&'a str; 1],
}

pub struct AfsEmbedding {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl AfsEmbedding {
    pub fn initialize(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let afs = &config.afs;
        let url = require(afs.url.as_deref(), "AFS_API_URL")?;
        let api_key = require(afs.api_key.as_deref(), "AFS_API_KEY")?;
        let model = require(afs.model.as_deref(), "AFS_EMBEDDING_MODEL_NAME")?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/models/embeddings", url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
        let value = parse_json(body)?;
        vector_field(value.pointer("/data/0/embedding"), "data[0].embedding")
    }
}

#[async_trait]
impl EmbeddingBackend for AfsEmbedding {
    fn name(&self) -> &'static str {
        "afs"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = AfsEmbeddingRequest {
            model: &self.model,
            inputs: [text],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AFS_HOST_HEADER, AFS_HOST_VALUE)
            .header(AFS_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = ensure_success(response).await?.text().await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AfsConfig;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            afs: AfsConfig {
                url: Some("https://afs.example/api/".to_string()),
                api_key: Some("secret".to_string()),
                model: Some("ffm-embedding".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_builds_endpoint() {
        let backend = AfsEmbedding::initialize(&config()).unwrap();
        assert_eq!(backend.endpoint, "https://afs.example/api/models/embeddings");
        assert_eq!(backend.name(), "afs");
    }

    #[test]
    fn test_initialize_requires_key() {
        let mut config = config();
        config.afs.api_key = None;
        assert!(matches!(
            AfsEmbedding::initialize(&config),
            Err(ConfigError::Missing(name)) if name == "AFS_API_KEY"
        ));
    }

    #[test]
    fn test_request_body() {
        let request = AfsEmbeddingRequest {
            model: "ffm-embedding",
            inputs: ["What is GDP?"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "ffm-embedding", "inputs": ["What is GDP?"]})
        );
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"data":[{"embedding":[0.1,0.2]}],"usage":{"total_tokens":3}}"#;
        assert_eq!(AfsEmbedding::parse_response(body).unwrap(), vec![0.1, 0.2]);

        assert!(matches!(
            AfsEmbedding::parse_response(r#"{"data":[]}"#),
            Err(EmbeddingError::ProviderResponse(_))
        ));
        assert!(matches!(
            AfsEmbedding::parse_response("<html>"),
            Err(EmbeddingError::ProviderResponse(_))
        ));
    }
}
