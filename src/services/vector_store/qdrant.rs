//! Qdrant vector store backend implementation.
//!
//! All logical collections share one physical Qdrant collection; the logical
//! name is a keyword payload field used as a search filter.

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{VectorStore, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Fragment, SearchResult, VectorDriver, VectorStoreConfig};

const FIELD_TEXT: &str = "text";
const FIELD_DOCUMENT_ID: &str = "document_id";
const FIELD_FILENAME: &str = "filename";
const FIELD_COLLECTION: &str = "collection";
const FIELD_INDEX: &str = "fragment_index";

/// gRPC codes that mean the server could not be reached or did not answer.
fn is_unavailable_code(code: &str) -> bool {
    matches!(code, "Unavailable" | "DeadlineExceeded")
}

fn is_connect_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("tcp connect error")
        || lower.contains("connection refused")
        || lower.contains("error trying to connect")
        || lower.contains("transport error")
        || lower.contains("dns error")
}

/// Connection failures become `StoreUnavailable`; anything else is wrapped
/// in the per-operation variant.
fn map_qdrant_error(e: QdrantError, wrap: fn(String) -> VectorStoreError) -> VectorStoreError {
    let unavailable = match &e {
        QdrantError::ResponseError { status } => {
            is_unavailable_code(&format!("{:?}", status.code()))
                || is_connect_failure(status.message())
        }
        QdrantError::Io(_) => true,
        other => is_connect_failure(&other.to_string()),
    };
    if unavailable {
        VectorStoreError::StoreUnavailable(e.to_string())
    } else {
        wrap(e.to_string())
    }
}

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, dimension: usize) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }

    fn collection_filter(collection: &str) -> Filter {
        Filter::must([Condition::matches(FIELD_COLLECTION, collection.to_string())])
    }

    fn build_payload(fragment: &Fragment, index: usize) -> HashMap<String, Value> {
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert(FIELD_TEXT.to_string(), fragment.text.clone().into());
        payload.insert(
            FIELD_DOCUMENT_ID.to_string(),
            fragment.source_document_id.to_string().into(),
        );
        payload.insert(
            FIELD_FILENAME.to_string(),
            fragment.source_filename.clone().into(),
        );
        payload.insert(
            FIELD_COLLECTION.to_string(),
            fragment.collection.clone().into(),
        );
        payload.insert(FIELD_INDEX.to_string(), (index as i64).into());
        payload
    }

    fn string_field<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Rebuild a search result from a point's payload, naming the first
    /// missing or invalid field.
    fn search_result(point: &ScoredPoint) -> Result<SearchResult, String> {
        let field = |key: &str| {
            Self::string_field(&point.payload, key).ok_or_else(|| format!("missing {}", key))
        };
        let document_id = field(FIELD_DOCUMENT_ID)?;
        let source_document_id = Uuid::parse_str(document_id)
            .map_err(|e| format!("invalid {} {:?}: {}", FIELD_DOCUMENT_ID, document_id, e))?;

        Ok(SearchResult {
            fragment_text: field(FIELD_TEXT)?.to_string(),
            source_filename: field(FIELD_FILENAME)?.to_string(),
            source_document_id,
            score: point.score,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::CollectionError))?;
        if exists {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::CollectionError))?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                FIELD_COLLECTION,
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::CollectionError))?;

        info!(
            collection = %self.collection,
            dimension = self.dimension,
            "created qdrant collection"
        );
        Ok(())
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        fragment: &Fragment,
        index: usize,
    ) -> Result<(), VectorStoreError> {
        check_dimension(&vector, self.dimension)?;

        let point = PointStruct::new(
            fragment.point_id(index).to_string(),
            vector,
            Self::build_payload(fragment, index),
        );
        let upsert = UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::InsertError))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        collection: &str,
        top_k: u64,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        check_dimension(&query_vector, self.dimension)?;

        let search_builder = SearchPointsBuilder::new(&self.collection, query_vector, top_k)
            .filter(Self::collection_filter(collection))
            .with_payload(true);

        let response = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::SearchError))?;

        let results = response
            .result
            .iter()
            .filter_map(|point| match Self::search_result(point) {
                Ok(result) => Some(result),
                Err(reason) => {
                    warn!(
                        collection = %collection,
                        point_id = ?point.id,
                        %reason,
                        "skipping point with damaged payload"
                    );
                    None
                }
            })
            .collect();

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let count = CountPointsBuilder::new(&self.collection)
            .filter(Self::collection_filter(collection))
            .exact(true);

        let response = self
            .client
            .count(count)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::SearchError))?;

        Ok(response.result.map_or(0, |r| r.count))
    }

    async fn delete_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        let filter = Filter::must([
            Condition::matches(FIELD_COLLECTION, collection.to_string()),
            Condition::matches(FIELD_DOCUMENT_ID, document_id.to_string()),
        ]);
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(filter)
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| map_qdrant_error(e, VectorStoreError::DeleteError))?;

        Ok(())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_payload() {
        let doc = Uuid::new_v4();
        let fragment = Fragment::new("GDP measures output", doc, "macro.pdf", "econ");
        let payload = QdrantBackend::build_payload(&fragment, 4);

        assert_eq!(
            QdrantBackend::string_field(&payload, FIELD_TEXT),
            Some("GDP measures output")
        );
        assert_eq!(
            QdrantBackend::string_field(&payload, FIELD_DOCUMENT_ID),
            Some(doc.to_string().as_str())
        );
        assert_eq!(
            QdrantBackend::string_field(&payload, FIELD_COLLECTION),
            Some("econ")
        );
        assert!(matches!(
            payload.get(FIELD_INDEX).and_then(|v| v.kind.clone()),
            Some(Kind::IntegerValue(4))
        ));
    }

    #[test]
    fn test_connection_failures_are_unavailable() {
        let refused = QdrantError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "tcp connect error",
        ));
        assert!(matches!(
            map_qdrant_error(refused, VectorStoreError::InsertError),
            VectorStoreError::StoreUnavailable(_)
        ));

        let bad_vector = QdrantError::ConversionError("sparse into dense".to_string());
        assert!(matches!(
            map_qdrant_error(bad_vector, VectorStoreError::SearchError),
            VectorStoreError::SearchError(_)
        ));

        assert!(is_unavailable_code("Unavailable"));
        assert!(is_unavailable_code("DeadlineExceeded"));
        assert!(!is_unavailable_code("InvalidArgument"));
        assert!(is_connect_failure(
            "error trying to connect: tcp connect error: Connection refused (os error 111)"
        ));
        assert!(!is_connect_failure("Wrong input: vector dimension error"));
    }

    #[test]
    fn test_search_result_from_payload() {
        let doc = Uuid::new_v4();
        let fragment = Fragment::new("GDP measures output", doc, "macro.pdf", "econ");
        let point = ScoredPoint {
            payload: QdrantBackend::build_payload(&fragment, 0),
            score: 0.75,
            ..Default::default()
        };

        let result = QdrantBackend::search_result(&point).unwrap();
        assert_eq!(result.fragment_text, "GDP measures output");
        assert_eq!(result.source_filename, "macro.pdf");
        assert_eq!(result.source_document_id, doc);
        assert_eq!(result.score, 0.75);
    }

    #[test]
    fn test_search_result_rejects_damaged_payload() {
        let fragment = Fragment::new("text", Uuid::new_v4(), "a.pdf", "econ");

        let mut payload = QdrantBackend::build_payload(&fragment, 0);
        payload.insert(FIELD_DOCUMENT_ID.to_string(), "not-a-uuid".to_string().into());
        let point = ScoredPoint {
            payload,
            ..Default::default()
        };
        let reason = QdrantBackend::search_result(&point).unwrap_err();
        assert!(reason.contains("invalid document_id"));

        let mut payload = QdrantBackend::build_payload(&fragment, 0);
        payload.remove(FIELD_FILENAME);
        let point = ScoredPoint {
            payload,
            ..Default::default()
        };
        assert_eq!(
            QdrantBackend::search_result(&point).unwrap_err(),
            "missing filename"
        );
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let backend = QdrantBackend::new(&VectorStoreConfig::default(), 1024).unwrap();
        assert_eq!(backend.driver(), VectorDriver::Qdrant);
        assert_eq!(backend.collection, "ragqa_fragments");
    }
}
