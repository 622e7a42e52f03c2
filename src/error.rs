//! Error types for the retrieval-augmented QA core.

use std::time::Duration;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Returns true when an HTTP status or message looks transient.
fn is_transient_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.contains("429")
        || msg_lower.contains("timeout")
        || msg_lower.contains("connection")
        || msg_lower.contains("unavailable")
        || msg_lower.contains("too many requests")
}

/// Errors related to configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("vector dimension {dimension} is below the minimum of {minimum}")]
    Dimension { dimension: usize, minimum: usize },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors raised while turning a document file into fragments.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("file extension '{actual}' does not match declared format '{declared}'")]
    FormatMismatch { actual: String, declared: String },

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to extract text: {0}")]
    ExtractionError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("invalid embedding response: {0}")]
    ProviderResponse(String),

    #[error("embedding has {actual} values but the configured dimension is {configured}")]
    Dimension { actual: usize, configured: usize },

    #[error("embedding model error: {0}")]
    ModelError(String),

    #[error("embedding timeout")]
    Timeout,
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EmbeddingError::Timeout
        } else {
            EmbeddingError::ProviderUnavailable(e.to_string())
        }
    }
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Timeout => true,
            EmbeddingError::ProviderUnavailable(msg) => is_transient_message(msg),
            EmbeddingError::ProviderResponse(_)
            | EmbeddingError::Dimension { .. }
            | EmbeddingError::ModelError(_) => false,
        }
    }
}

/// Errors related to text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("invalid generation response: {0}")]
    ProviderResponse(String),

    #[error("generation timeout")]
    Timeout,
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::ProviderUnavailable(e.to_string())
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("vector has {actual} values, store expects {expected}")]
    DimensionMismatch { actual: usize, expected: usize },

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::StoreUnavailable(_) => true,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::InsertError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg)
            | VectorStoreError::PostgresError(msg) => is_transient_message(msg),
            VectorStoreError::DimensionMismatch { .. }
            | VectorStoreError::PgVectorExtensionError(_) => false,
        }
    }
}

/// Errors from the relational record store.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("record query failed: {0}")]
    QueryError(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for RecordError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RecordError::NotFound(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RecordError::StoreUnavailable(e.to_string())
            }
            other => RecordError::QueryError(other.to_string()),
        }
    }
}

/// Terminal errors of an ingestion or question-answering call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("record store error: {0}")]
    Record(#[from] RecordError),

    #[error("generation response was malformed: {0}")]
    MalformedGeneration(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("question timed out after {0:?}")]
    Timeout(Duration),

    #[error("question cancelled by caller")]
    Cancelled,

    #[error("worker task failed: {0}")]
    TaskError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("infrastructure not running: {0}")]
    InfrastructureError(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ProviderUnavailable("status 503".to_string()).is_retryable());
        assert!(!EmbeddingError::ProviderUnavailable("status 401".to_string()).is_retryable());
        assert!(
            !EmbeddingError::Dimension {
                actual: 10,
                configured: 8
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_vector_store_error_retryable() {
        assert!(VectorStoreError::StoreUnavailable("refused".to_string()).is_retryable());
        assert!(VectorStoreError::InsertError("connection reset".to_string()).is_retryable());
        assert!(!VectorStoreError::InsertError("bad payload".to_string()).is_retryable());
    }

    #[test]
    fn test_format_mismatch_message() {
        let err = SplitError::FormatMismatch {
            actual: "txt".to_string(),
            declared: "docx".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "file extension 'txt' does not match declared format 'docx'"
        );
    }
}
