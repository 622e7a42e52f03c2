//! Generation provider abstraction.
//!
//! The current backend lives behind an `Arc` swapped under a short write
//! lock. A call clones the `Arc` and releases the lock before any network
//! I/O, so switching backends only affects calls started afterwards.

mod afs;
mod ollama;
mod openai;

pub use afs::AfsGeneration;
pub use ollama::OllamaGeneration;
pub use openai::OpenAiGeneration;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Response;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, GenerationError};
use crate::models::{
    GenerationBackendKind, GenerationConfig, GenerationOutcome, GenerationRequest,
    GenerationResult,
};
use crate::utils::strip_bold_markup;

/// A single text-generation provider.
///
/// Implementations return `ProviderResponse` when the reply lacks the
/// generated text or the prompt token count.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError>;
}

/// Build the backend named by `kind`, failing fast on missing settings.
pub fn create_backend(
    kind: GenerationBackendKind,
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationBackend>, ConfigError> {
    let backend: Arc<dyn GenerationBackend> = match kind {
        GenerationBackendKind::Afs => Arc::new(AfsGeneration::initialize(config)?),
        GenerationBackendKind::Ollama => Arc::new(OllamaGeneration::initialize(config)?),
        GenerationBackendKind::OpenAi => Arc::new(OpenAiGeneration::initialize(config)?),
    };
    Ok(backend)
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::ProviderUnavailable(format!(
        "status {}: {}",
        status.as_u16(),
        body
    )))
}

pub(crate) fn parse_json(body: &str) -> Result<serde_json::Value, GenerationError> {
    serde_json::from_str(body)
        .map_err(|e| GenerationError::ProviderResponse(format!("response is not JSON: {}", e)))
}

/// Pull the text and prompt token count out of a provider reply.
pub(crate) fn extract_result(
    value: &serde_json::Value,
    text_pointer: &str,
    tokens_pointer: &str,
) -> Result<GenerationResult, GenerationError> {
    let text = value
        .pointer(text_pointer)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GenerationError::ProviderResponse(format!("missing {}", text_pointer)))?;
    let prompt_token_count = value
        .pointer(tokens_pointer)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| GenerationError::ProviderResponse(format!("missing {}", tokens_pointer)))?;

    Ok(GenerationResult {
        text: text.to_string(),
        prompt_token_count,
    })
}

pub struct GenerationService {
    backend: RwLock<Arc<dyn GenerationBackend>>,
}

impl GenerationService {
    pub fn initialize(config: &GenerationConfig) -> Result<Self, ConfigError> {
        let backend = create_backend(config.backend, config)?;
        info!(backend = backend.name(), "generation backend initialized");
        Ok(Self::with_backend(backend))
    }

    pub fn with_backend(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend: RwLock::new(backend),
        }
    }

    pub async fn current_backend(&self) -> Arc<dyn GenerationBackend> {
        Arc::clone(&*self.backend.read().await)
    }

    pub async fn backend_name(&self) -> &'static str {
        self.current_backend().await.name()
    }

    /// Initialize `kind` and make it the backend for subsequent calls.
    ///
    /// On failure the current backend stays in place.
    pub async fn switch_backend(
        &self,
        kind: GenerationBackendKind,
        config: &GenerationConfig,
    ) -> Result<(), ConfigError> {
        let backend = create_backend(kind, config)?;
        self.replace_backend(backend).await;
        Ok(())
    }

    pub async fn replace_backend(&self, backend: Arc<dyn GenerationBackend>) {
        let name = backend.name();
        let previous = std::mem::replace(&mut *self.backend.write().await, backend);
        info!(from = previous.name(), to = name, "generation backend switched");
    }

    /// Generate an answer, stripping `**` from the text.
    ///
    /// A reply missing its expected fields becomes `GenerationOutcome::Malformed`
    /// instead of an error; transport failures are still errors.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let backend = self.current_backend().await;
        debug!(
            backend = backend.name(),
            messages = request.conversation.len(),
            max_tokens = request.max_tokens,
            "sending generation request"
        );

        match backend.generate(request).await {
            Ok(result) => Ok(GenerationOutcome::Generated(GenerationResult {
                text: strip_bold_markup(&result.text),
                prompt_token_count: result.prompt_token_count,
            })),
            Err(GenerationError::ProviderResponse(reason)) => {
                warn!(backend = backend.name(), %reason, "malformed generation response");
                Ok(GenerationOutcome::Malformed { reason })
            }
            Err(e) => Err(e),
        }
    }
}
