//! Local embedding provider backed by fastembed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::embeddings::EmbeddingProvider;
use crate::error::EmbeddingError;

/// Local embedding provider running a small model in-process.
///
/// No API key required. The model is downloaded on first use.
pub struct LocalEmbeddings {
    model: Arc<fastembed::TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl LocalEmbeddings {
    /// Create a local provider with the default model (all-MiniLM-L6-v2).
    ///
    /// Vectors are padded or truncated to `dimension` so the index shape
    /// is stable across provider swaps.
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| EmbeddingError::Initialization(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            dimension,
            model_name: "all-MiniLM-L6-v2".to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn max_input_length(&self) -> usize {
        // MiniLM context window
        512
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        let texts_owned = texts.to_vec();
        let target_dim = self.dimension;

        tracing::debug!(count = texts_owned.len(), "embedding batch on worker thread");

        // The ONNX runtime is synchronous and wants a deep stack, so run
        // it on a dedicated thread instead of the async runtime.
        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::Builder::new()
            .name("fastembed-worker".to_string())
            .stack_size(8 * 1024 * 1024)
            .spawn(move || {
                let res = model.embed(texts_owned, None);
                let _ = tx.send(res);
            })
            .map_err(|e| EmbeddingError::Execution(format!("failed to spawn thread: {}", e)))?;

        let result = rx
            .await
            .map_err(|e| EmbeddingError::Execution(format!("thread join error: {}", e)))?
            .map_err(|e| EmbeddingError::Execution(e.to_string()))?;

        let vectors = result
            .into_iter()
            .map(|mut vec| {
                if vec.len() < target_dim {
                    vec.resize(target_dim, 0.0);
                } else if vec.len() > target_dim {
                    vec.truncate(target_dim);
                }
                vec
            })
            .collect();

        Ok(vectors)
    }
}
