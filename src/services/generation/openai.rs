//! OpenAI-compatible chat completions backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{GenerationBackend, ensure_success, extract_result, parse_json};
use crate::error::{ConfigError, GenerationError};
use crate::models::{
    ConversationMessage, GenerationConfig, GenerationRequest, GenerationResult, require,
};
use crate::services::embedding::http_client;

/// Chat completions have no `top_k`; it is dropped.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
}

pub struct OpenAiGeneration {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGeneration {
    pub fn initialize(config: &GenerationConfig) -> Result<Self, ConfigError> {
        let openai = &config.openai;
        let api_key = require(openai.api_key.as_deref(), "OPENAI_API_KEY")?;
        let model = require(openai.model.as_deref(), "OPENAI_MODEL_NAME")?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!(
                "{}/chat/completions",
                openai.base_url.trim_end_matches('/')
            ),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn build_request<'a>(
        model: &'a str,
        request: &'a GenerationRequest,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model,
            messages: &request.conversation,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
        }
    }

    fn parse_response(body: &str) -> Result<GenerationResult, GenerationError> {
        let value = parse_json(body)?;
        extract_result(&value, "/choices/0/message/content", "/usage/prompt_tokens")
    }
}

#[async_trait]
impl GenerationBackend for OpenAiGeneration {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let body = Self::build_request(&self.model, request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let text = ensure_success(response).await?.text().await?;
        Self::parse_response(&text)
    }
}
