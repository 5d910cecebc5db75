//! Test support: stub providers and a component harness.
//!
//! Provides:
//! - [`StubLlm`]: a scripted inference provider with queued responses
//! - [`TestHarness`] / [`TestHarnessBuilder`]: assembled engine
//!   components backed by stubs and a temp directory

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{PipelineConfig, SandboxConfig, SelectorConfig};
use crate::embeddings::MockEmbeddings;
use crate::error::LlmError;
use crate::index::SimilarityIndex;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::sandbox::LuaSandbox;
use crate::storage::ToolStore;
use crate::tools::ToolRegistry;

enum StubReply {
    Text(String),
    Json(serde_json::Value),
    Error(LlmError),
}

/// Scripted inference provider.
///
/// Replies are consumed in queue order; an empty queue is a test bug
/// and fails loudly with a `RequestFailed`.
pub struct StubLlm {
    replies: Mutex<VecDeque<StubReply>>,
    calls: AtomicU32,
}

impl StubLlm {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue a free-text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(StubReply::Text(text.into()));
    }

    /// Queue a structured reply.
    pub fn push_json(&self, value: serde_json::Value) {
        self.replies.lock().unwrap().push_back(StubReply::Json(value));
    }

    /// Queue a gateway failure.
    pub fn push_error(&self) {
        self.replies.lock().unwrap().push_back(StubReply::Error(
            LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "scripted failure".to_string(),
            },
        ));
    }

    /// How many completions were requested.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> StubReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                StubReply::Error(LlmError::RequestFailed {
                    provider: "stub".to_string(),
                    reason: "stub reply queue exhausted".to_string(),
                })
            })
    }
}

impl Default for StubLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, _req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self.next() {
            StubReply::Text(content) => Ok(CompletionResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
            }),
            StubReply::Json(value) => Ok(CompletionResponse {
                content: value.to_string(),
                input_tokens: 0,
                output_tokens: 0,
            }),
            StubReply::Error(e) => Err(e),
        }
    }

    async fn complete_structured(
        &self,
        _req: CompletionRequest,
        _schema_name: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        match self.next() {
            StubReply::Json(value) => Ok(value),
            StubReply::Text(content) => serde_json::from_str(&content).map_err(|e| {
                LlmError::InvalidResponse {
                    provider: "stub".to_string(),
                    reason: format!("queued text is not JSON: {}", e),
                }
            }),
            StubReply::Error(e) => Err(e),
        }
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// Assembled engine components for tests.
pub struct TestHarness {
    pub llm: Arc<StubLlm>,
    pub registry: Arc<ToolRegistry>,
    pub index: Arc<SimilarityIndex>,
    pub sandbox: LuaSandbox,
    pub store: Arc<ToolStore>,
    pub selector_config: SelectorConfig,
    pub pipeline_config: PipelineConfig,
    /// Keeps the storage directory alive for the test's duration.
    pub dir: tempfile::TempDir,
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    embedding_dim: usize,
}

impl TestHarnessBuilder {
    pub fn new() -> Self {
        Self { embedding_dim: 64 }
    }

    pub fn embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn build(self) -> TestHarness {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store =
            Arc::new(ToolStore::new(dir.path().join("tools")).expect("failed to open tool store"));

        TestHarness {
            llm: Arc::new(StubLlm::new()),
            registry: Arc::new(ToolRegistry::new()),
            index: Arc::new(SimilarityIndex::new(Arc::new(MockEmbeddings::new(
                self.embedding_dim,
            )))),
            sandbox: LuaSandbox::new(SandboxConfig::default()),
            store,
            // Mock embeddings are hash-derived, so even related texts sit
            // near distance 1.0; a permissive cutoff keeps retrieval
            // deterministic in tests.
            selector_config: SelectorConfig {
                top_k: 5,
                score_cutoff: 2.0,
            },
            pipeline_config: PipelineConfig::default(),
            dir,
        }
    }
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_replies_in_order() {
        let llm = StubLlm::new();
        llm.push_text("first");
        llm.push_text("second");

        let r1 = llm.complete(CompletionRequest::new(None, "x")).await.unwrap();
        let r2 = llm.complete(CompletionRequest::new(None, "x")).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_fails_loudly() {
        let llm = StubLlm::new();
        let err = llm.complete(CompletionRequest::new(None, "x")).await;
        assert!(err.is_err());
    }
}
