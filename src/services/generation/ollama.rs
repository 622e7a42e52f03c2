//! Ollama chat backend (`/api/chat`, non-streaming).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{GenerationBackend, ensure_success, extract_result, parse_json};
use crate::error::{ConfigError, GenerationError};
use crate::models::{
    ConversationMessage, GenerationConfig, GenerationRequest, GenerationResult, require,
};
use crate::services::embedding::http_client;

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    stream: bool,
    options: OllamaOptions,
}

pub struct OllamaGeneration {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaGeneration {
    pub fn initialize(config: &GenerationConfig) -> Result<Self, ConfigError> {
        let ollama = &config.ollama;
        let model = require(ollama.model.as_deref(), "OLLAMA_MODEL_NAME")?;
        if ollama.port == 0 {
            return Err(ConfigError::ValidationError(
                "OLLAMA_PORT must be between 1 and 65535".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/api/chat", ollama.base_url()),
            model: model.to_string(),
        })
    }

    fn build_request<'a>(model: &'a str, request: &'a GenerationRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model,
            messages: &request.conversation,
            stream: false,
            options: OllamaOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                top_k: request.top_k,
                top_p: request.top_p,
                frequency_penalty: request.frequency_penalty,
            },
        }
    }

    fn parse_response(body: &str) -> Result<GenerationResult, GenerationError> {
        let value = parse_json(body)?;
        extract_result(&value, "/message/content", "/prompt_eval_count")
    }
}

#[async_trait]
impl GenerationBackend for OllamaGeneration {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let body = Self::build_request(&self.model, request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        let text = ensure_success(response).await?.text().await?;
        Self::parse_response(&text)
    }
}
