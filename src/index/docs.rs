//! Reference documentation passages for code generation context.
//!
//! Passages live as plain files in a directory, one passage per file.
//! They are indexed at session start so the creation pipeline can pull
//! relevant excerpts into its prompts.

use std::path::Path;
use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::error::{EmbeddingError, StorageError};
use crate::index::{RetrievalCandidate, SimilarityIndex};

/// Retrieval over a directory of documentation passages.
pub struct DocsIndex {
    index: SimilarityIndex,
}

impl DocsIndex {
    /// Build an empty index.
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index: SimilarityIndex::new(embeddings),
        }
    }

    /// Load every readable file under `dir` as one passage each.
    ///
    /// Unreadable or non-UTF8 files are skipped with a warning rather
    /// than failing the whole load.
    pub async fn load_dir(&self, dir: &Path) -> Result<usize, crate::error::Error> {
        let mut items: Vec<(String, String)> = Vec::new();

        let entries = std::fs::read_dir(dir).map_err(|e| StorageError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable dir entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) if !content.trim().is_empty() => {
                    let id = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string());
                    items.push((id, content));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping passage: {}", e);
                }
            }
        }

        let count = items.len();
        self.index
            .upsert_batch(&items)
            .await
            .map_err(crate::error::Error::Embedding)?;
        tracing::info!(count, dir = %dir.display(), "documentation passages indexed");
        Ok(count)
    }

    /// Retrieve the passages most relevant to a task description.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        cutoff: f32,
    ) -> Result<Vec<RetrievalCandidate>, EmbeddingError> {
        self.index.query(query, top_k, cutoff).await
    }

    pub async fn len(&self) -> usize {
        self.index.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddings;

    fn docs() -> DocsIndex {
        DocsIndex::new(Arc::new(MockEmbeddings::new(64)))
    }

    #[tokio::test]
    async fn loads_one_passage_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("strings.txt"), "string handling notes").unwrap();
        std::fs::write(dir.path().join("math.txt"), "math function notes").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let idx = docs();
        let count = idx.load_dir(dir.path()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(idx.len().await, 2);
    }

    #[tokio::test]
    async fn retrieves_matching_passage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "convert temperatures").unwrap();
        std::fs::write(dir.path().join("b.txt"), "sort a table").unwrap();

        let idx = docs();
        idx.load_dir(dir.path()).await.unwrap();

        let hits = idx.retrieve("convert temperatures", 5, 2.0).await.unwrap();
        assert_eq!(hits[0].name, "a.txt");
    }

    #[tokio::test]
    async fn missing_dir_is_storage_error() {
        let idx = docs();
        let err = idx
            .load_dir(Path::new("/nonexistent/toolwright-docs"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Storage(_)));
    }
}
