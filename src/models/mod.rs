mod config;
mod conversation;
mod document;
mod prompt;
mod report;
mod search;

pub use config::{
    AfsConfig, CONFIG_PATH_ENV, Config, DEFAULT_COLLECTION, DEFAULT_DELIMITER, DEFAULT_QDRANT_URL,
    DEFAULT_VECTOR_COLLECTION, DEFAULT_VECTOR_DIMENSION, EmbeddingBackendKind, EmbeddingConfig,
    GenerationBackendKind, GenerationConfig, GenerationParams, LocalModelConfig,
    MIN_VECTOR_DIMENSION, OllamaConfig, OpenAiConfig, PipelineConfig, PromptConfig,
    RecordStoreConfig, SearchConfig, SplitterConfig, VectorDriver, VectorStoreConfig, require,
};
pub use conversation::{
    ConversationMessage, GenerationOutcome, GenerationRequest, GenerationResult, Language, Persona,
    Role,
};
pub use document::{DocumentFormat, Fragment};
pub use prompt::{
    DOCUMENTS_PLACEHOLDER, PersonaPrompts, PromptTable, PromptTemplate, QUESTION_PLACEHOLDER,
};
pub use report::{Answer, FragmentFailure, IngestReport, Rating, RecordStatus};
pub use search::{OutputFormat, SearchResult, SourceAttribution, dedup_by_filename};
