use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{EmbeddingService, GenerationService, vector_store};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedding_error = EmbeddingService::initialize(&config.embedding)
        .err()
        .map(|e| e.to_string());
    let generation_error = GenerationService::initialize(&config.generation)
        .err()
        .map(|e| e.to_string());

    let collection = config.search.default_collection.clone();
    let (vector_store_connected, fragments) =
        match vector_store::create_backend(&config.vector_store, config.embedding.dimension).await
        {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let fragments = if connected {
                    store.count(&collection).await.unwrap_or(0)
                } else {
                    0
                };
                (connected, fragments)
            }
            Err(_) => (false, 0),
        };

    let status = StatusInfo {
        embedding_backend: config.embedding.backend.to_string(),
        embedding_error,
        dimension: config.embedding.dimension,
        generation_backend: config.generation.backend.to_string(),
        generation_error,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection,
        fragments,
        record_store_configured: config.records.url.is_some(),
    };

    print!("{}", formatter.format_status(&status));

    if !vector_store_connected {
        eprintln!();
        match config.vector_store.driver {
            VectorDriver::Qdrant => {
                eprintln!("Warning: Qdrant not running. Start with: docker-compose up -d qdrant");
            }
            VectorDriver::Postgres => {
                eprintln!("Warning: PostgreSQL not accessible. Check VECTOR_STORE_URL.");
            }
            VectorDriver::Memory => {}
        }
    }

    Ok(())
}
