//! OpenAI-compatible embedding backend (`/embeddings`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{EmbeddingBackend, ensure_success, http_client, parse_json, vector_field};
use crate::error::{ConfigError, EmbeddingError};
use crate::models::{EmbeddingConfig, require};

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

pub struct OpenAiEmbedding {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedding {
    pub fn initialize(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let openai = &config.openai;
        let api_key = require(openai.api_key.as_deref(), "OPENAI_API_KEY")?;
        let model = require(openai.model.as_deref(), "OPENAI_EMBEDDING_MODEL_NAME")?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/embeddings", openai.base_url.trim_end_matches('/')),
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
impl EmbeddingBackend for OpenAiEmbedding {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = OpenAiEmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = ensure_success(response).await?.text().await?;
        Self::parse_response(&body)
    }
}
