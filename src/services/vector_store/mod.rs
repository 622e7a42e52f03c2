//! Vector store abstraction layer.
//!
//! This module provides a trait-based abstraction over different vector store backends
//! (Qdrant, PostgreSQL/pgvector, in-process memory) selected by configuration.
//!
//! Logical collections are namespaces inside one physical collection or table.
//! Clients never retry; retry policy belongs to the pipeline.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::InMemoryStore;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VectorStoreError;
use crate::models::{Fragment, SearchResult, VectorDriver, VectorStoreConfig};

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create the physical collection/table if it doesn't exist.
    async fn ensure_schema(&self) -> Result<(), VectorStoreError>;

    /// Store one fragment vector. `index` is the fragment's position in its
    /// document and keys the stored point.
    async fn insert(
        &self,
        vector: Vec<f32>,
        fragment: &Fragment,
        index: usize,
    ) -> Result<(), VectorStoreError>;

    /// At most `top_k` fragments of `collection`, by descending similarity.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        collection: &str,
        top_k: u64,
    ) -> Result<Vec<SearchResult>, VectorStoreError>;

    /// Number of fragments stored in `collection`.
    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError>;

    /// Remove every fragment of one document from `collection`.
    async fn delete_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError>;

    fn driver(&self) -> VectorDriver;
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), VectorStoreError> {
    if vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
            actual: vector.len(),
            expected,
        });
    }
    Ok(())
}

/// Create a vector store backend for vectors of width `dimension`.
pub async fn create_backend(
    config: &VectorStoreConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, dimension)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Postgres => {
            let backend = PgVectorBackend::new(config, dimension).await?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Memory => Ok(Arc::new(InMemoryStore::new(dimension))),
    }
}
