mod ask;
mod config;
mod ingest;
mod rate;
mod status;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use rate::RateArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use rate::handle_rate;
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::{Config, PromptTable};
use crate::services::{
    DocumentSplitter, EmbeddingService, GenerationService, PgRecordStore, Pipeline, vector_store,
};

/// Wire every configured backend into a pipeline.
///
/// Missing or invalid provider settings fail here, before any document or
/// question is touched.
pub(crate) async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedding = EmbeddingService::initialize(&config.embedding)
        .context("failed to initialize embedding backend")?;
    let generation = GenerationService::initialize(&config.generation)
        .context("failed to initialize generation backend")?;
    let prompts =
        PromptTable::from_config(&config.prompts).context("failed to load prompt table")?;

    let store = vector_store::create_backend(&config.vector_store, config.embedding.dimension)
        .await
        .context("failed to create vector store backend")?;
    store
        .ensure_schema()
        .await
        .context("failed to prepare vector store")?;

    let mut pipeline = Pipeline::new(
        DocumentSplitter::from_config(&config.splitter),
        Arc::new(embedding),
        store,
        Arc::new(generation),
        Arc::new(prompts),
    )
    .with_config(config.pipeline.clone())
    .with_generation_params(config.generation.params)
    .with_default_top_k(config.search.default_top_k);

    if config.records.url.is_some() {
        let records = PgRecordStore::connect(&config.records)
            .await
            .context("failed to connect to record store")?;
        pipeline = pipeline.with_records(Arc::new(records));
    }

    Ok(pipeline)
}
