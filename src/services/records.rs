//! Relational record store.
//!
//! The chat/qa/attachment/file tables belong to the surrounding application;
//! this module only reads and writes rows through an injected pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{DocumentFormat, Rating, RecordStoreConfig};

/// A completed question/answer exchange ready to be persisted.
#[derive(Debug, Clone)]
pub struct QaRecord {
    pub chat_id: Uuid,
    pub answer_id: Uuid,
    pub question: String,
    pub answer: String,
    pub prompt_token_count: u64,
    pub sent_by: String,
    pub file_ids: Vec<Uuid>,
}

/// A freshly ingested document to register.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub document_id: Uuid,
    pub filename: String,
    pub collection: String,
    pub format: DocumentFormat,
    pub tags: serde_json::Value,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist the QA row and its attachments atomically.
    async fn record_answer(&self, record: &QaRecord) -> Result<(), RecordError>;

    async fn document_filename(&self, document_id: Uuid) -> Result<String, RecordError>;

    async fn update_rating(&self, answer_id: Uuid, rating: Rating) -> Result<(), RecordError>;

    async fn register_document(&self, document: &DocumentRecord) -> Result<(), RecordError>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &RecordStoreConfig) -> Result<Self, RecordError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| RecordError::StoreUnavailable("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout as u64))
            .connect(url)
            .await
            .map_err(|e| RecordError::StoreUnavailable(e.to_string()))?;

        info!(pool_max = config.pool_max, "connected to record store");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Attachment file ids with duplicates removed, first occurrence kept.
fn unique_file_ids(file_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    file_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// First characters of the answer, used as the chat title.
fn chat_name(answer: &str) -> String {
    answer.chars().take(10).collect()
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn record_answer(&self, record: &QaRecord) -> Result<(), RecordError> {
        let chat_id = record.chat_id.to_string();
        let answer_id = record.answer_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO chat (chat_id, user_id, chat_name)
            SELECT $1, user_id, $3 FROM "user" WHERE username = $2
            ON CONFLICT (chat_id) DO NOTHING
            "#,
        )
        .bind(&chat_id)
        .bind(&record.sent_by)
        .bind(chat_name(&record.answer))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO qa (chat_id, qa_id, question, answer, token_size, sent_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&chat_id)
        .bind(&answer_id)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(record.prompt_token_count as i64)
        .bind(&record.sent_by)
        .execute(&mut *tx)
        .await?;

        let file_ids = unique_file_ids(&record.file_ids);
        for file_id in &file_ids {
            sqlx::query("INSERT INTO attachment (chat_id, qa_id, file_id) VALUES ($1, $2, $3)")
                .bind(&chat_id)
                .bind(&answer_id)
                .bind(file_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            chat_id = %record.chat_id,
            answer_id = %record.answer_id,
            attachments = file_ids.len(),
            "recorded answer"
        );
        Ok(())
    }

    async fn document_filename(&self, document_id: Uuid) -> Result<String, RecordError> {
        let row = sqlx::query("SELECT file_name FROM file WHERE file_id = $1")
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("document {}", document_id)))?;

        Ok(row.try_get("file_name")?)
    }

    async fn update_rating(&self, answer_id: Uuid, rating: Rating) -> Result<(), RecordError> {
        let result = sqlx::query("UPDATE qa SET rating = $1 WHERE qa_id = $2")
            .bind(rating.as_bool())
            .bind(answer_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(format!("answer {}", answer_id)));
        }
        info!(answer_id = %answer_id, %rating, "rating updated");
        Ok(())
    }

    async fn register_document(&self, document: &DocumentRecord) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            INSERT INTO file (file_id, file_name, tags, collection)
            VALUES ($1, $2, $3::jsonb, $4)
            "#,
        )
        .bind(document.document_id.to_string())
        .bind(&document.filename)
        .bind(document.tags.to_string())
        .bind(&document.collection)
        .execute(&self.pool)
        .await?;

        debug!(
            document_id = %document.document_id,
            collection = %document.collection,
            format = %document.format,
            "document registered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_file_ids_keeps_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(unique_file_ids(&[a, b, a, b, a]), vec![a, b]);
        assert!(unique_file_ids(&[]).is_empty());
    }

    #[test]
    fn test_chat_name_counts_characters() {
        assert_eq!(chat_name("國內生產毛額是一個經濟指標"), "國內生產毛額是一個經");
        assert_eq!(chat_name("short"), "short");
    }

    #[tokio::test]
    async fn test_connect_requires_url() {
        let config = RecordStoreConfig {
            url: None,
            ..Default::default()
        };
        assert!(matches!(
            PgRecordStore::connect(&config).await,
            Err(RecordError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_new_accepts_lazy_pool() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/ragqa")
            .unwrap();
        let store = PgRecordStore::new(pool);
        assert_eq!(store.pool().size(), 0);
    }
}
