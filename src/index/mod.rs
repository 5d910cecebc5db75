//! In-process similarity index for semantic retrieval.
//!
//! Entries are keyed by name and scored with cosine distance, where
//! 0.0 is identical and 2.0 is opposite. The index is rebuilt from
//! durable storage at session start and kept in sync with it at every
//! store and delete.

pub mod docs;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::embeddings::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexError};

/// A single retrieval hit.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    /// Entry key (tool name or passage id).
    pub name: String,
    /// The text that was indexed.
    pub text: String,
    /// Cosine distance to the query. Lower is more similar.
    pub distance: f32,
}

struct IndexEntry {
    text: String,
    vector: Vec<f32>,
}

/// Similarity index over named text entries.
///
/// All mutation goes through `upsert` and `delete`; readers take a
/// shared lock so queries never block each other.
pub struct SimilarityIndex {
    embeddings: Arc<dyn EmbeddingProvider>,
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl SimilarityIndex {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insert or replace an entry under `name`.
    pub async fn upsert(&self, name: &str, text: &str) -> Result<(), EmbeddingError> {
        let vector = self.embeddings.embed(text).await?;
        let mut entries = self.entries.write().await;
        entries.insert(
            name.to_string(),
            IndexEntry {
                text: text.to_string(),
                vector,
            },
        );
        Ok(())
    }

    /// Bulk insert. Texts are embedded in one batch.
    pub async fn upsert_batch(&self, items: &[(String, String)]) -> Result<(), EmbeddingError> {
        if items.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = items.iter().map(|(_, t)| t.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;

        let mut entries = self.entries.write().await;
        for ((name, text), vector) in items.iter().zip(vectors) {
            entries.insert(
                name.clone(),
                IndexEntry {
                    text: text.clone(),
                    vector,
                },
            );
        }
        Ok(())
    }

    /// Remove an entry. Returns `NotFound` if it was never indexed.
    pub async fn delete(&self, name: &str) -> Result<(), IndexError> {
        let mut entries = self.entries.write().await;
        entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| IndexError::NotFound(name.to_string()))
    }

    /// Retrieve up to `top_k` entries within `cutoff` cosine distance of
    /// the query, closest first.
    pub async fn query(
        &self,
        query: &str,
        top_k: usize,
        cutoff: f32,
    ) -> Result<Vec<RetrievalCandidate>, EmbeddingError> {
        let query_vec = self.embeddings.embed(query).await?;
        let entries = self.entries.read().await;

        let mut candidates: Vec<RetrievalCandidate> = entries
            .iter()
            .map(|(name, entry)| RetrievalCandidate {
                name: name.clone(),
                text: entry.text.clone(),
                distance: cosine_distance(&query_vec, &entry.vector),
            })
            .filter(|c| c.distance <= cutoff)
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(top_k);

        Ok(candidates)
    }
}

/// Cosine distance between two vectors: `1 - cos(a, b)`.
///
/// A zero-magnitude vector is treated as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (mag_a * mag_b)
}
