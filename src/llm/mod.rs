//! Inference gateway.
//!
//! A single trait, [`LlmProvider`], fronts every model endpoint. The
//! only concrete implementation speaks the OpenAI-compatible chat
//! completions API, which covers OpenAI itself plus most self-hosted
//! gateways.

mod openai;
mod provider;
mod retry;

pub use openai::OpenAiCompatProvider;
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Build the configured inference provider.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatProvider::new(config.clone())?;
    tracing::info!(model = %config.model, base_url = %config.base_url, "llm provider ready");
    Ok(Arc::new(provider))
}
