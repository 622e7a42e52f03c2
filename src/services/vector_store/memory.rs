//! In-process vector store using cosine similarity.
//!
//! Used for tests and local runs without an external store. Points are kept
//! in insertion order per collection and searched with a stable sort, so
//! equal scores come back in the order they were inserted.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{VectorStore, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Fragment, SearchResult, VectorDriver};

#[derive(Debug, Clone)]
struct StoredPoint {
    id: Uuid,
    vector: Vec<f32>,
    fragment: Fragment,
}

#[derive(Debug)]
pub struct InMemoryStore {
    dimension: usize,
    collections: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            collections: RwLock::new(HashMap::new()),
        }
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        fragment: &Fragment,
        index: usize,
    ) -> Result<(), VectorStoreError> {
        check_dimension(&vector, self.dimension)?;

        let id = fragment.point_id(index);
        let point = StoredPoint {
            id,
            vector,
            fragment: fragment.clone(),
        };

        let mut collections = self.collections.write().await;
        let points = collections.entry(fragment.collection.clone()).or_default();
        match points.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        collection: &str,
        top_k: u64,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        check_dimension(&query_vector, self.dimension)?;

        let collections = self.collections.read().await;
        let Some(points) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<SearchResult> = points
            .iter()
            .map(|p| SearchResult {
                fragment_text: p.fragment.text.clone(),
                source_filename: p.fragment.source_filename.clone(),
                source_document_id: p.fragment.source_document_id,
                score: cosine_similarity(&p.vector, &query_vector),
            })
            .collect();

        // sort_by is stable: ties keep insertion order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(usize::try_from(top_k).unwrap_or(usize::MAX));
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |p| p.len() as u64))
    }

    async fn delete_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        if let Some(points) = collections.get_mut(collection) {
            points.retain(|p| p.fragment.source_document_id != document_id);
        }
        Ok(())
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let store = InMemoryStore::new(8);
        let doc = Uuid::new_v4();
        store
            .insert(unit(8, 0), &Fragment::new("far", doc, "a.pdf", "econ"), 0)
            .await
            .unwrap();
        store
            .insert(unit(8, 1), &Fragment::new("near", doc, "a.pdf", "econ"), 1)
            .await
            .unwrap();

        let results = store.search(unit(8, 1), "econ", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].fragment_text, "near");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryStore::new(8);
        let doc = Uuid::new_v4();
        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            store
                .insert(unit(8, 2), &Fragment::new(*text, doc, "a.pdf", "econ"), i)
                .await
                .unwrap();
        }

        let results = store.search(unit(8, 2), "econ", 3).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.fragment_text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_search_is_scoped_and_limited() {
        let store = InMemoryStore::new(8);
        let doc = Uuid::new_v4();
        for i in 0..5 {
            store
                .insert(unit(8, i), &Fragment::new("econ", doc, "a.pdf", "econ"), i)
                .await
                .unwrap();
        }
        store
            .insert(unit(8, 0), &Fragment::new("law", doc, "b.pdf", "law"), 0)
            .await
            .unwrap();

        let results = store.search(unit(8, 0), "econ", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.fragment_text == "econ"));
        assert!(store.search(unit(8, 0), "missing", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reinsert_replaces_point() {
        let store = InMemoryStore::new(8);
        let doc = Uuid::new_v4();
        let fragment = Fragment::new("v1", doc, "a.pdf", "econ");
        store.insert(unit(8, 0), &fragment, 0).await.unwrap();
        store
            .insert(unit(8, 0), &Fragment::new("v2", doc, "a.pdf", "econ"), 0)
            .await
            .unwrap();
        assert_eq!(store.count("econ").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let store = InMemoryStore::new(8);
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        store
            .insert(unit(8, 0), &Fragment::new("k", keep, "k.pdf", "econ"), 0)
            .await
            .unwrap();
        store
            .insert(unit(8, 0), &Fragment::new("d", drop, "d.pdf", "econ"), 0)
            .await
            .unwrap();

        store.delete_document("econ", drop).await.unwrap();
        assert_eq!(store.count("econ").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let store = InMemoryStore::new(8);
        let fragment = Fragment::new("x", Uuid::new_v4(), "a.pdf", "econ");
        let err = store.insert(vec![1.0; 4], &fragment, 0).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }
}
