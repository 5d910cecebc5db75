//! JSON encode/decode tools.

use std::time::Instant;

use async_trait::async_trait;

use crate::tools::builtin::require_str;
use crate::tools::tool::{ExceptionKind, ExecutionResult, Tool, ToolOrigin};

/// Serialize a value to a JSON string.
pub struct JsonEncodeTool;

#[async_trait]
impl Tool for JsonEncodeTool {
    fn name(&self) -> &str {
        "json_encode"
    }

    fn description(&self) -> &str {
        "Serialize a value into a JSON string."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "value": {
                    "description": "The value to serialize"
                },
                "pretty": {
                    "type": "boolean",
                    "description": "Pretty-print the output"
                }
            },
            "required": ["value"]
        })
    }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Builtin
    }

    async fn execute(&self, params: serde_json::Value) -> ExecutionResult {
        let start = Instant::now();

        let Some(value) = params.get("value") else {
            return ExecutionResult::fail(
                self.name(),
                params.clone(),
                ExceptionKind::RuntimeError,
                "missing required parameter 'value'",
                start.elapsed(),
            );
        };

        let pretty = params
            .get("pretty")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let encoded = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };

        match encoded {
            Ok(s) => ExecutionResult::ok(
                self.name(),
                params.clone(),
                serde_json::json!(s),
                Vec::new(),
                start.elapsed(),
            ),
            Err(e) => ExecutionResult::fail(
                self.name(),
                params.clone(),
                ExceptionKind::RuntimeError,
                format!("serialization failed: {}", e),
                start.elapsed(),
            ),
        }
    }
}

/// Parse a JSON string into a value.
pub struct JsonDecodeTool;

#[async_trait]
impl Tool for JsonDecodeTool {
    fn name(&self) -> &str {
        "json_decode"
    }

    fn description(&self) -> &str {
        "Parse a JSON string into a structured value."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The JSON text to parse"
                }
            },
            "required": ["text"]
        })
    }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Builtin
    }

    async fn execute(&self, params: serde_json::Value) -> ExecutionResult {
        let start = Instant::now();

        let text = match require_str(&params, "text") {
            Ok(t) => t,
            Err(msg) => {
                return ExecutionResult::fail(
                    self.name(),
                    params.clone(),
                    ExceptionKind::RuntimeError,
                    msg,
                    start.elapsed(),
                )
            }
        };

        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => ExecutionResult::ok(
                self.name(),
                params.clone(),
                value,
                Vec::new(),
                start.elapsed(),
            ),
            Err(e) => ExecutionResult::fail(
                self.name(),
                params.clone(),
                ExceptionKind::RuntimeError,
                format!("parse failed: {}", e),
                start.elapsed(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encode_roundtrip() {
        let result = JsonEncodeTool
            .execute(serde_json::json!({"value": {"a": 1}}))
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap(), serde_json::json!("{\"a\":1}"));
    }

    #[tokio::test]
    async fn decode_valid_json() {
        let result = JsonDecodeTool
            .execute(serde_json::json!({"text": "[1, 2, 3]"}))
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap(), serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn decode_invalid_json_is_runtime_failure() {
        let result = JsonDecodeTool
            .execute(serde_json::json!({"text": "{nope"}))
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::RuntimeError));
    }
}
