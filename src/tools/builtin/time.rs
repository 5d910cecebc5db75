//! Time utility tool.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::tools::tool::{ExceptionKind, ExecutionResult, Tool, ToolOrigin};

/// Current time and timestamp parsing.
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current UTC time, or parse an ISO 8601 timestamp into its components."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "timestamp": {
                    "type": "string",
                    "description": "Optional ISO 8601 timestamp to parse instead of using the current time"
                }
            },
            "required": []
        })
    }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Builtin
    }

    async fn execute(&self, params: serde_json::Value) -> ExecutionResult {
        let start = Instant::now();

        let dt: DateTime<Utc> = match params.get("timestamp").and_then(|v| v.as_str()) {
            Some(ts) => match ts.parse() {
                Ok(dt) => dt,
                Err(e) => {
                    return ExecutionResult::fail(
                        self.name(),
                        params.clone(),
                        ExceptionKind::RuntimeError,
                        format!("invalid timestamp: {}", e),
                        start.elapsed(),
                    )
                }
            },
            None => Utc::now(),
        };

        ExecutionResult::ok(
            self.name(),
            params,
            serde_json::json!({
                "iso": dt.to_rfc3339(),
                "unix": dt.timestamp(),
                "unix_millis": dt.timestamp_millis(),
            }),
            Vec::new(),
            start.elapsed(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::require_str;

    #[tokio::test]
    async fn now_succeeds() {
        let result = TimeTool.execute(serde_json::json!({})).await;
        assert!(result.success);
        let out = result.output.unwrap();
        assert!(out.get("iso").is_some());
        assert!(out.get("unix").is_some());
    }

    #[tokio::test]
    async fn parse_known_timestamp() {
        let result = TimeTool
            .execute(serde_json::json!({"timestamp": "2024-01-01T00:00:00Z"}))
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap()["unix"], 1704067200);
    }

    #[tokio::test]
    async fn bad_timestamp_is_runtime_failure() {
        let result = TimeTool
            .execute(serde_json::json!({"timestamp": "not a time"}))
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::RuntimeError));
    }

    #[test]
    fn require_str_reports_missing() {
        let err = require_str(&serde_json::json!({}), "x").unwrap_err();
        assert!(err.contains("'x'"));
    }
}
