use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{VectorStore, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Fragment, SearchResult, VectorDriver, VectorStoreConfig};

/// pgvector table holding every logical collection.
///
/// `seq` grows with each insert and breaks score ties in insertion order.
pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    index_prefix: String,
    schema: Option<String>,
    dimension: usize,
}

fn map_sqlx_error(e: sqlx::Error, wrap: fn(String) -> VectorStoreError) -> VectorStoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            VectorStoreError::StoreUnavailable(e.to_string())
        }
        other => wrap(other.to_string()),
    }
}

impl PgVectorBackend {
    pub async fn new(config: &VectorStoreConfig, dimension: usize) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;

        Ok(Self::with_pool(pool, config, dimension))
    }

    /// Build on an existing pool, e.g. one shared with the record store.
    pub fn with_pool(pool: PgPool, config: &VectorStoreConfig, dimension: usize) -> Self {
        Self {
            pool,
            table_name: config.qualified_table_name(),
            index_prefix: config.collection.clone(),
            schema: config.schema.clone(),
            dimension,
        }
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, VectorStoreError::PostgresError))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                seq BIGSERIAL NOT NULL,
                collection TEXT NOT NULL,
                document_id UUID NOT NULL,
                filename TEXT NOT NULL,
                fragment_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding vector({}) NOT NULL
            )
            "#,
            self.table_name, self.dimension
        )
    }

    fn search_sql(&self) -> String {
        format!(
            r#"
            SELECT
                text,
                filename,
                document_id,
                1 - (embedding <=> $1) AS score
            FROM {}
            WHERE collection = $2
            ORDER BY embedding <=> $1, seq
            LIMIT $3
            "#,
            self.table_name
        )
    }
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        self.check_pgvector_extension().await?;

        if let Some(ref schema) = self.schema {
            let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
            sqlx::query(&query)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, VectorStoreError::CollectionError))?;
        }

        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, VectorStoreError::CollectionError))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.index_prefix, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_collection_idx ON {} (collection, document_id)",
                self.index_prefix, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, VectorStoreError::CollectionError))?;
        }

        info!(table = %self.table_name, dimension = self.dimension, "pgvector table ready");
        Ok(())
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        fragment: &Fragment,
        index: usize,
    ) -> Result<(), VectorStoreError> {
        check_dimension(&vector, self.dimension)?;

        let query = format!(
            r#"
            INSERT INTO {} (id, collection, document_id, filename, fragment_index, text, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                filename = EXCLUDED.filename,
                text = EXCLUDED.text,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        );

        let fragment_index = i32::try_from(index)
            .map_err(|_| VectorStoreError::InsertError(format!("fragment index {index} too large")))?;

        sqlx::query(&query)
            .bind(fragment.point_id(index))
            .bind(&fragment.collection)
            .bind(fragment.source_document_id)
            .bind(&fragment.source_filename)
            .bind(fragment_index)
            .bind(&fragment.text)
            .bind(Vector::from(vector))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, VectorStoreError::InsertError))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        collection: &str,
        top_k: u64,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        check_dimension(&query_vector, self.dimension)?;

        let limit = i64::try_from(top_k).unwrap_or(i64::MAX);
        let rows = sqlx::query(&self.search_sql())
            .bind(Vector::from(query_vector))
            .bind(collection)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, VectorStoreError::SearchError))?;

        rows.into_iter()
            .map(|row: PgRow| {
                let score: f64 = row
                    .try_get("score")
                    .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;
                Ok(SearchResult {
                    fragment_text: row
                        .try_get("text")
                        .map_err(|e| VectorStoreError::SearchError(e.to_string()))?,
                    source_filename: row
                        .try_get("filename")
                        .map_err(|e| VectorStoreError::SearchError(e.to_string()))?,
                    source_document_id: row
                        .try_get::<Uuid, _>("document_id")
                        .map_err(|e| VectorStoreError::SearchError(e.to_string()))?,
                    score: score as f32,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let query = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE collection = $1",
            self.table_name
        );
        let row: (i64,) = sqlx::query_as(&query)
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, VectorStoreError::PostgresError))?;

        Ok(row.0.max(0) as u64)
    }

    async fn delete_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        let query = format!(
            "DELETE FROM {} WHERE collection = $1 AND document_id = $2",
            self.table_name
        );
        sqlx::query(&query)
            .bind(collection)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, VectorStoreError::DeleteError))?;

        Ok(())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Postgres
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> PgVectorBackend {
        let config = VectorStoreConfig {
            driver: VectorDriver::Postgres,
            url: "postgres://localhost/ragqa".to_string(),
            schema: Some("rag".to_string()),
            ..Default::default()
        };
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.url)
            .unwrap();
        PgVectorBackend::with_pool(pool, &config, 1024)
    }

    #[tokio::test]
    async fn test_create_table_sql_uses_dimension() {
        let sql = backend().create_table_sql();
        assert!(sql.contains("rag.ragqa_fragments"));
        assert!(sql.contains("vector(1024)"));
        assert!(sql.contains("seq BIGSERIAL"));
    }

    #[tokio::test]
    async fn test_search_sql_scopes_and_breaks_ties() {
        let sql = backend().search_sql();
        assert!(sql.contains("WHERE collection = $2"));
        assert!(sql.contains("ORDER BY embedding <=> $1, seq"));
        assert!(sql.contains("LIMIT $3"));
    }

    #[test]
    fn test_map_sqlx_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut, VectorStoreError::InsertError),
            VectorStoreError::StoreUnavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound, VectorStoreError::InsertError),
            VectorStoreError::InsertError(_)
        ));
    }
}
