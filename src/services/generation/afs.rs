//! Hosted inference API (AFS) conversation backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{GenerationBackend, ensure_success, extract_result, parse_json};
use crate::error::{ConfigError, GenerationError};
use crate::models::{GenerationConfig, GenerationRequest, GenerationResult, Role, require};
use crate::services::embedding::{AFS_HOST_HEADER, AFS_HOST_VALUE, AFS_KEY_HEADER, http_client};

#[derive(Debug, Serialize)]
struct AfsMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AfsParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    // field name is fixed by the service
    frequence_penalty: f32,
}

#[derive(Debug, Serialize)]
struct AfsConversationRequest<'a> {
    model: &'a str,
    messages: Vec<AfsMessage<'a>>,
    parameters: AfsParameters,
}

fn afs_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Assistant => "assistant",
        Role::User => "human",
    }
}

pub struct AfsGeneration {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl AfsGeneration {
    pub fn initialize(config: &GenerationConfig) -> Result<Self, ConfigError> {
        let afs = &config.afs;
        let url = require(afs.url.as_deref(), "API_URL")?;
        let api_key = require(afs.api_key.as_deref(), "API_KEY")?;
        let model = require(afs.model.as_deref(), "MODEL_NAME")?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/models/conversation", url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn build_request<'a>(
        model: &'a str,
        request: &'a GenerationRequest,
    ) -> AfsConversationRequest<'a> {
        AfsConversationRequest {
            model,
            messages: request
                .conversation
                .iter()
                .map(|m| AfsMessage {
                    role: afs_role(m.role),
                    content: &m.content,
                })
                .collect(),
            parameters: AfsParameters {
                max_new_tokens: request.max_tokens,
                temperature: request.temperature,
                top_k: request.top_k,
                top_p: request.top_p,
                frequence_penalty: request.frequency_penalty,
            },
        }
    }

    fn parse_response(body: &str) -> Result<GenerationResult, GenerationError> {
        let value = parse_json(body)?;
        extract_result(&value, "/generated_text", "/prompt_tokens")
    }
}

#[async_trait]
impl GenerationBackend for AfsGeneration {
    fn name(&self) -> &'static str {
        "afs"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let body = Self::build_request(&self.model, request);

        let response = self
            .client
            .post(&self.endpoint)
            .header(AFS_HOST_HEADER, AFS_HOST_VALUE)
            .header(AFS_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let text = ensure_success(response).await?.text().await?;
        Self::parse_response(&text)
    }
}
