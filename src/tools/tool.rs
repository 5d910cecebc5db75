//! Tool trait and execution envelope types.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a tool came from.
///
/// Origin decides the trust boundary: builtin and previously persisted
/// tools run with the trusted budget, freshly generated code runs fully
/// sandboxed until it has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOrigin {
    /// Compiled into the binary.
    Builtin,
    /// Loaded from durable storage at session start.
    Stored,
    /// Produced by the creation pipeline during this session.
    Generated,
}

/// Classification of a tool failure.
///
/// Every failure that crosses a component boundary carries exactly one
/// of these kinds, so callers can branch on category without parsing
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Code failed to parse.
    SyntaxError,
    /// Code parsed but violated a structural requirement.
    ValidationError,
    /// Code raised during execution.
    RuntimeError,
    /// Execution exceeded its wall-clock budget.
    TimeoutError,
    /// Execution exceeded its memory budget.
    MemoryError,
    /// The named tool does not exist.
    NotFound,
    /// The tool name is already taken.
    NamingConflict,
    /// An upstream model call failed.
    GatewayError,
}

impl std::fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExceptionKind::SyntaxError => "syntax_error",
            ExceptionKind::ValidationError => "validation_error",
            ExceptionKind::RuntimeError => "runtime_error",
            ExceptionKind::TimeoutError => "timeout_error",
            ExceptionKind::MemoryError => "memory_error",
            ExceptionKind::NotFound => "not_found",
            ExceptionKind::NamingConflict => "naming_conflict",
            ExceptionKind::GatewayError => "gateway_error",
        };
        f.write_str(s)
    }
}

/// A recorded failure inside an execution envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: ExceptionKind,
    pub message: String,
    /// Interpreter stack trace, when one was produced.
    #[serde(default)]
    pub traceback: Option<String>,
    /// Source line of the failure, when known.
    #[serde(default)]
    pub line_number: Option<u32>,
}

/// Outcome envelope for every tool run.
///
/// Execution is total: success and failure both come back as a value,
/// never as a propagated error. Captured print output is preserved in
/// `logs` regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Name the call was dispatched under.
    pub tool_name: String,
    /// Arguments the call was made with.
    pub parameters_used: serde_json::Value,
    pub success: bool,
    /// Result value, present on success.
    pub output: Option<serde_json::Value>,
    /// Failure detail, present when `success` is false.
    pub failure: Option<ExecutionFailure>,
    /// Captured print output, in emission order.
    pub logs: Vec<String>,
    /// Wall-clock time taken.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Successful run with a result value.
    pub fn ok(
        tool_name: impl Into<String>,
        parameters_used: serde_json::Value,
        output: serde_json::Value,
        logs: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters_used,
            success: true,
            output: Some(output),
            failure: None,
            logs,
            duration,
        }
    }

    /// Failed run with a classified error.
    pub fn fail(
        tool_name: impl Into<String>,
        parameters_used: serde_json::Value,
        kind: ExceptionKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters_used,
            success: false,
            output: None,
            failure: Some(ExecutionFailure {
                kind,
                message: message.into(),
                traceback: None,
                line_number: None,
            }),
            logs: Vec::new(),
            duration,
        }
    }

    /// Attach captured print output to a failure envelope.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    /// Attach interpreter detail to a failure envelope.
    pub fn with_failure_detail(
        mut self,
        traceback: Option<String>,
        line_number: Option<u32>,
    ) -> Self {
        if let Some(failure) = self.failure.as_mut() {
            failure.traceback = traceback;
            failure.line_number = line_number;
        }
        self
    }

    /// Kind of the recorded failure, if any.
    pub fn failure_kind(&self) -> Option<ExceptionKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    /// JSON type name: "string", "number", "boolean", "array", "object".
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Specification of a tool to create, produced by task analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Storage category, e.g. "conversion" or "text".
    pub category: String,
    /// JSON type name of the value the tool returns.
    #[serde(default = "default_return_type")]
    pub return_type: String,
    /// Free-form retrieval tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub params: Vec<ToolParam>,
}

fn default_return_type() -> String {
    "any".to_string()
}

impl ToolSpec {
    /// Text used to index this tool for semantic retrieval.
    pub fn descriptor(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} ({}): {}", p.name, p.param_type, p.description))
            .collect();
        let mut text = if params.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} | params: {}",
                self.name,
                self.description,
                params.join("; ")
            )
        };
        if !self.tags.is_empty() {
            text.push_str(&format!(" | tags: {}", self.tags.join(", ")));
        }
        text
    }

    /// JSON Schema for the declared parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                serde_json::json!({"type": p.param_type, "description": p.description}),
            );
            if p.required {
                required.push(serde_json::Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Schema surfaced to the model for tool selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Trait for callable tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// What the tool does, written for retrieval.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Trust origin of this tool.
    fn origin(&self) -> ToolOrigin;

    /// Execute with the given parameters.
    ///
    /// Always returns an envelope; implementations must catch their own
    /// failures and classify them.
    async fn execute(&self, params: serde_json::Value) -> ExecutionResult;

    /// Text used to index this tool for semantic retrieval.
    fn descriptor(&self) -> String {
        format!("{}: {}", self.name(), self.description())
    }

    /// Schema for model-facing tool listings.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "c_to_f".to_string(),
            description: "Convert celsius to fahrenheit".to_string(),
            category: "conversion".to_string(),
            return_type: "number".to_string(),
            tags: vec!["temperature".to_string()],
            params: vec![ToolParam {
                name: "celsius".to_string(),
                description: "Temperature in celsius".to_string(),
                param_type: "number".to_string(),
                required: true,
            }],
        }
    }

    #[test]
    fn descriptor_includes_params_and_tags() {
        let d = spec().descriptor();
        assert!(d.contains("c_to_f"));
        assert!(d.contains("celsius"));
        assert!(d.contains("temperature"));
    }

    #[test]
    fn spec_defaults_return_type_and_tags() {
        let spec: ToolSpec = serde_json::from_value(serde_json::json!({
            "name": "noop",
            "description": "Do nothing",
            "category": "misc",
        }))
        .unwrap();
        assert_eq!(spec.return_type, "any");
        assert!(spec.tags.is_empty());
    }

    #[test]
    fn parameters_schema_marks_required() {
        let schema = spec().parameters_schema();
        assert_eq!(schema["required"][0], "celsius");
        assert_eq!(schema["properties"]["celsius"]["type"], "number");
    }

    #[test]
    fn envelope_constructors() {
        let params = serde_json::json!({"celsius": 100});
        let ok = ExecutionResult::ok(
            "c_to_f",
            params.clone(),
            serde_json::json!(212.0),
            vec![],
            Duration::from_millis(3),
        );
        assert!(ok.success);
        assert!(ok.failure.is_none());
        assert_eq!(ok.tool_name, "c_to_f");
        assert_eq!(ok.parameters_used, params);

        let fail = ExecutionResult::fail(
            "c_to_f",
            params,
            ExceptionKind::RuntimeError,
            "attempt to index nil",
            Duration::from_millis(1),
        )
        .with_failure_detail(Some("stack traceback: ...".to_string()), Some(2));
        assert!(!fail.success);
        assert_eq!(fail.failure_kind(), Some(ExceptionKind::RuntimeError));
        let failure = fail.failure.unwrap();
        assert_eq!(failure.line_number, Some(2));
        assert!(failure.traceback.is_some());
    }

    #[test]
    fn exception_kind_display_is_stable() {
        assert_eq!(ExceptionKind::TimeoutError.to_string(), "timeout_error");
        assert_eq!(ExceptionKind::NamingConflict.to_string(), "naming_conflict");
    }
}
