//! Ollama embedding backend (`/api/embeddings`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{EmbeddingBackend, ensure_success, http_client, parse_json, vector_field};
use crate::error::{ConfigError, EmbeddingError};
use crate::models::{EmbeddingConfig, require};

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

pub struct OllamaEmbedding {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedding {
    pub fn initialize(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let ollama = &config.ollama;
        let model = require(ollama.model.as_deref(), "OLLAMA_EMBEDDING_MODEL_NAME")?;
        if ollama.port == 0 {
            return Err(ConfigError::ValidationError(
                "OLLAMA_PORT must be between 1 and 65535".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/api/embeddings", ollama.base_url()),
            model: model.to_string(),
        })
    }

    fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
        let value = parse_json(body)?;
        vector_field(value.get("embedding"), "embedding")
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedding {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let body = ensure_success(response).await?.text().await?;
        Self::parse_response(&body)
    }
}
