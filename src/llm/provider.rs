//! Inference gateway trait and request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request for a plain text completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Build a request from an optional system prompt and a user prompt.
    pub fn new(system: Option<&str>, user: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(s) = system {
            messages.push(ChatMessage::system(s));
        }
        messages.push(ChatMessage::user(user));
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Response to a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait for inference gateway providers.
///
/// A failure always surfaces as `LlmError`, never as an empty string
/// treated as success.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Free-text completion.
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Schema-constrained completion.
    ///
    /// The returned object is guaranteed to be valid JSON carrying every
    /// property listed in the schema's top-level `required` array;
    /// anything else is an `LlmError`.
    async fn complete_structured(
        &self,
        req: CompletionRequest,
        schema_name: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError>;

    /// Model identifier used by this provider.
    fn model_name(&self) -> &str;
}

/// Check a structured response against the schema's `required` list.
///
/// This is a shape check, not full JSON Schema validation: providers
/// enforce the schema server-side, this guards against degenerate
/// responses slipping through.
pub(crate) fn check_required_properties(
    value: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), LlmError> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for prop in required {
        if let Some(name) = prop.as_str() {
            if value.get(name).is_none() {
                return Err(LlmError::SchemaMismatch {
                    property: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_orders_messages() {
        let req = CompletionRequest::new(Some("be brief"), "hello");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
    }

    #[test]
    fn required_properties_enforced() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "string"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        });

        let ok = serde_json::json!({"a": "x", "b": 1});
        assert!(check_required_properties(&ok, &schema).is_ok());

        let missing = serde_json::json!({"a": "x"});
        let err = check_required_properties(&missing, &schema).unwrap_err();
        assert!(matches!(err, LlmError::SchemaMismatch { property } if property == "b"));
    }

    #[test]
    fn no_required_list_passes() {
        let schema = serde_json::json!({"type": "object"});
        assert!(check_required_properties(&serde_json::json!({}), &schema).is_ok());
    }
}
