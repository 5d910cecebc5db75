//! Embedding providers for semantic retrieval.
//!
//! Embeddings convert text into dense vectors that capture semantic
//! meaning. Tool descriptors and documentation passages are indexed by
//! vector so that natural-language task descriptions can find them.

mod local;
mod openai;

pub use local::LocalEmbeddings;
pub use openai::OpenAiEmbeddings;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::EmbeddingsConfig;
use crate::error::EmbeddingError;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding vector dimension.
    fn dimension(&self) -> usize;

    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Maximum input length in characters.
    fn max_input_length(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed multiple texts (batched).
    ///
    /// Default implementation calls embed() for each text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Build the configured embedding provider.
pub fn create_embedding_provider(
    config: &EmbeddingsConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => {
            let key = config
                .api_key
                .as_ref()
                .ok_or(EmbeddingError::AuthFailed)?
                .expose_secret()
                .to_string();
            tracing::info!(model = %config.model, "using OpenAI embeddings");
            Ok(Arc::new(OpenAiEmbeddings::with_model(
                key,
                config.model.clone(),
                config.dimension,
            )))
        }
        "local" => {
            tracing::info!(model = %config.model, "using local embeddings");
            Ok(Arc::new(LocalEmbeddings::new(config.dimension)?))
        }
        other => Err(EmbeddingError::Initialization(format!(
            "unknown embedding provider '{}'",
            other
        ))),
    }
}

/// Deterministic embedding provider for tests.
///
/// Hashes the text into a seed and expands it into a unit vector, so
/// equal texts always embed identically.
pub struct MockEmbeddings {
    dimension: usize,
}

impl MockEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn max_input_length(&self) -> usize {
        10_000
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        let mut seed = hash;
        for _ in 0..self.dimension {
            // Simple LCG for deterministic values.
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = (seed as f32 / u64::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut embedding {
                *x /= magnitude;
            }
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_unit_vectors() {
        let provider = MockEmbeddings::new(128);

        let embedding = provider.embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 128);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn mock_embeddings_deterministic() {
        let provider = MockEmbeddings::new(64);

        let emb1 = provider.embed("test").await.unwrap();
        let emb2 = provider.embed("test").await.unwrap();
        assert_eq!(emb1, emb2);
    }

    #[tokio::test]
    async fn mock_embeddings_batch() {
        let provider = MockEmbeddings::new(64);

        let texts = vec!["hello".to_string(), "world".to_string()];
        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_ne!(embeddings[0], embeddings[1]);
    }
}
