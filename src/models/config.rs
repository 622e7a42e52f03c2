use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_COLLECTION: &str = "default";
pub const DEFAULT_VECTOR_DIMENSION: usize = 1024;
pub const MIN_VECTOR_DIMENSION: usize = 8;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_VECTOR_COLLECTION: &str = "ragqa_fragments";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DELIMITER: &str = "。";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RAGQA_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub records: RecordStoreConfig,

    #[serde(default)]
    pub splitter: SplitterConfig,

    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join("ragqa").join("config.toml"))
    }

    /// Load the config file (if any), apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load only the TOML file, falling back to defaults when it is absent.
    pub fn load_file() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Overlay deployment environment variables on top of the file values.
    ///
    /// `lookup` abstracts the environment so tests do not touch process state.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = get("EMBEDDING_DEPLOY_MODE") {
            self.embedding.backend = mode.parse()?;
        }
        if let Some(dim) = get("VECTOR_DIM") {
            self.embedding.dimension = parse_number("VECTOR_DIM", &dim)?;
        }
        if let Some(url) = get("AFS_API_URL") {
            self.embedding.afs.url = Some(url);
        }
        if let Some(key) = get("AFS_API_KEY") {
            self.embedding.afs.api_key = Some(key);
        }
        if let Some(model) = get("AFS_EMBEDDING_MODEL_NAME") {
            self.embedding.afs.model = Some(model);
        }
        if let Some(host) = get("OLLAMA_HOST") {
            self.embedding.ollama.host = host.clone();
            self.generation.ollama.host = host;
        }
        if let Some(port) = get("OLLAMA_PORT") {
            let port: u16 = parse_number("OLLAMA_PORT", &port)?;
            self.embedding.ollama.port = port;
            self.generation.ollama.port = port;
        }
        if let Some(model) = get("OLLAMA_EMBEDDING_MODEL_NAME") {
            self.embedding.ollama.model = Some(model);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.embedding.openai.api_key = Some(key.clone());
            self.generation.openai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.embedding.openai.base_url = url.clone();
            self.generation.openai.base_url = url;
        }
        if let Some(model) = get("OPENAI_EMBEDDING_MODEL_NAME") {
            self.embedding.openai.model = Some(model);
        }
        if let Some(dir) = get("LOCAL_EMBEDDING_MODEL_DIR") {
            self.embedding.local.model_dir = Some(PathBuf::from(dir));
        }

        if let Some(mode) = get("GENERATION_DEPLOY_MODE") {
            self.generation.backend = mode.parse()?;
        }
        if let Some(url) = get("API_URL") {
            self.generation.afs.url = Some(url);
        }
        if let Some(key) = get("API_KEY") {
            self.generation.afs.api_key = Some(key);
        }
        if let Some(model) = get("MODEL_NAME") {
            self.generation.afs.model = Some(model);
        }
        if let Some(model) = get("OLLAMA_MODEL_NAME") {
            self.generation.ollama.model = Some(model);
        }
        if let Some(model) = get("OPENAI_MODEL_NAME") {
            self.generation.openai.model = Some(model);
        }

        if let Some(driver) = get("VECTOR_STORE_DRIVER") {
            self.vector_store.driver = driver.parse()?;
        }
        if let Some(url) = get("VECTOR_STORE_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = get("VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Some(url) = get("DATABASE_URL") {
            self.records.url = Some(url);
        }
        if let Some(path) = get("PROMPT_TABLE_PATH") {
            self.prompts.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Reject settings that can never work. Backend credentials are checked
    /// when the backend is initialized.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension < MIN_VECTOR_DIMENSION {
            return Err(ConfigError::Dimension {
                dimension: self.embedding.dimension,
                minimum: MIN_VECTOR_DIMENSION,
            });
        }
        if self.splitter.delimiter.is_empty() {
            return Err(ConfigError::ValidationError(
                "splitter.delimiter must not be empty".to_string(),
            ));
        }
        if self.pipeline.ingest_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.ingest_concurrency must be at least 1".to_string(),
            ));
        }
        if self.pipeline.question_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.question_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.pipeline.record_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.record_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_top_k must be at least 1".to_string(),
            ));
        }
        for (name, port) in [
            ("embedding.ollama.port", self.embedding.ollama.port),
            ("generation.ollama.port", self.generation.ollama.port),
        ] {
            if port == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 65535"
                )));
            }
        }
        if self.generation.params.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.params.max_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} is not a valid number: {value}")))
}

/// Reject a missing or blank credential.
pub fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name.to_string())),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// In-process ONNX model
    Local,
    /// Hosted inference API (AFS)
    Afs,
    /// On-prem Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible API
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::str::FromStr for EmbeddingBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "afs" => Ok(Self::Afs),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for EmbeddingBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Afs => write!(f, "afs"),
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackendKind {
    /// Hosted inference API (AFS)
    #[default]
    Afs,
    /// On-prem Ollama server
    Ollama,
    /// OpenAI-compatible API
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::str::FromStr for GenerationBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "afs" => Ok(Self::Afs),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for GenerationBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Afs => write!(f, "afs"),
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Credentials for the hosted inference API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AfsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    #[serde(default = "default_ollama_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_ollama_host() -> String {
    DEFAULT_OLLAMA_HOST.to_string()
}

fn default_ollama_port() -> u16 {
    DEFAULT_OLLAMA_PORT
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            port: default_ollama_port(),
            model: None,
        }
    }
}

impl OllamaConfig {
    /// `host:port` with the host's scheme preserved.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
            model: None,
        }
    }
}

/// In-process ONNX embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Width of the model's own output; defaults to the configured dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dimension: Option<usize>,
}

fn default_max_tokens() -> u32 {
    512
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_tokens: default_max_tokens(),
            output_dimension: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackendKind,

    /// Fixed width `D` of every stored and query vector
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub afs: AfsConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub local: LocalModelConfig,
}

fn default_dimension() -> usize {
    DEFAULT_VECTOR_DIMENSION
}

fn default_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::default(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            afs: AfsConfig::default(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            local: LocalModelConfig::default(),
        }
    }
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_max_new_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,
}

fn default_max_new_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.6
}

fn default_top_k() -> u32 {
    30
}

fn default_top_p() -> f32 {
    1.0
}

fn default_frequency_penalty() -> f32 {
    1.0
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            frequency_penalty: default_frequency_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub backend: GenerationBackendKind,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub params: GenerationParams,

    #[serde(default)]
    pub afs: AfsConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackendKind::default(),
            timeout_secs: default_timeout(),
            params: GenerationParams::default(),
            afs: AfsConfig::default(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    Postgres,
    Memory,
}

impl std::str::FromStr for VectorDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "postgres" | "postgresql" | "pgvector" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qdrant => write!(f, "qdrant"),
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Physical Qdrant collection or Postgres table holding every logical collection
    #[serde(default = "default_vector_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_vector_collection() -> String {
    DEFAULT_VECTOR_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    10
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_vector_collection(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

impl VectorStoreConfig {
    pub fn qualified_table_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.collection),
            None => self.collection.clone(),
        }
    }
}

/// Relational store for QA records, ratings and document metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    /// Postgres connection URL; records are skipped when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Sentence terminator used to cut the normalized document text
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// External prompt table; the built-in table is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fragments embedded and inserted concurrently per ingestion
    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,

    /// Retries after the first attempt for embedding and store calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Bounds provider work for one question: embedding, search and generation
    #[serde(default = "default_question_timeout")]
    pub question_timeout_secs: u64,

    /// Bounds the QA record write that follows a generated answer
    #[serde(default = "default_record_timeout")]
    pub record_timeout_secs: u64,
}

fn default_ingest_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_question_timeout() -> u64 {
    120
}

fn default_record_timeout() -> u64 {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_concurrency: default_ingest_concurrency(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            question_timeout_secs: default_question_timeout(),
            record_timeout_secs: default_record_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_top_k")]
    pub default_top_k: u64,

    #[serde(default = "default_collection")]
    pub default_collection: String,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_search_top_k() -> u64 {
    5
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_search_top_k(),
            default_collection: default_collection(),
            default_format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.dimension, DEFAULT_VECTOR_DIMENSION);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.search.default_collection, DEFAULT_COLLECTION);
        assert_eq!(config.splitter.delimiter, "。");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generation_params_default() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 8192);
        assert_eq!(params.top_k, 30);
        assert!((params.temperature - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("EMBEDDING_DEPLOY_MODE", "afs"),
                ("VECTOR_DIM", "4096"),
                ("AFS_API_URL", "https://afs.example"),
                ("GENERATION_DEPLOY_MODE", "ollama"),
                ("OLLAMA_PORT", "12345"),
                ("OLLAMA_MODEL_NAME", "llama3"),
                ("VECTOR_STORE_DRIVER", "memory"),
            ]))
            .unwrap();

        assert_eq!(config.embedding.backend, EmbeddingBackendKind::Afs);
        assert_eq!(config.embedding.dimension, 4096);
        assert_eq!(config.embedding.afs.url.as_deref(), Some("https://afs.example"));
        assert_eq!(config.generation.backend, GenerationBackendKind::Ollama);
        assert_eq!(config.generation.ollama.port, 12345);
        assert_eq!(config.embedding.ollama.port, 12345);
        assert_eq!(config.generation.ollama.model.as_deref(), Some("llama3"));
        assert_eq!(config.vector_store.driver, VectorDriver::Memory);
    }

    #[test]
    fn test_apply_env_rejects_unknown_backend() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("EMBEDDING_DEPLOY_MODE", "bogus")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(_)));
    }

    #[test]
    fn test_apply_env_rejects_bad_port() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("OLLAMA_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_dimension_minimum() {
        let mut config = Config::default();
        config.embedding.dimension = 7;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Dimension {
                dimension: 7,
                minimum: 8
            })
        ));
        config.embedding.dimension = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip_with_partial_file() {
        let content = r#"
            [embedding]
            backend = "openai"
            dimension = 1536

            [generation.params]
            temperature = 0.2
        "#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::OpenAi);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.generation.params.max_tokens, 8192);
        assert!((config.generation.params.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.pipeline.ingest_concurrency, 4);
    }

    #[test]
    fn test_ollama_base_url() {
        let mut ollama = OllamaConfig::default();
        assert_eq!(ollama.base_url(), "http://localhost:11434");
        ollama.host = "gpu-box".to_string();
        assert_eq!(ollama.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_require() {
        assert_eq!(require(Some("x"), "KEY").unwrap(), "x");
        assert!(matches!(require(Some("  "), "KEY"), Err(ConfigError::Missing(_))));
        assert!(matches!(require(None, "KEY"), Err(ConfigError::Missing(_))));
    }
}
