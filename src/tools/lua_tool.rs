//! Interpreter-backed tool built from generated code.

use std::time::Duration;

use async_trait::async_trait;

use crate::sandbox::LuaSandbox;
use crate::tools::tool::{
    ExceptionKind, ExecutionResult, Tool, ToolOrigin, ToolSpec,
};

/// A tool whose body is Lua source run in the sandbox.
///
/// The wall-clock budget is fixed at construction from the tool's
/// trust origin, so promotion to trusted is an explicit rebuild rather
/// than a flag flip.
pub struct LuaTool {
    spec: ToolSpec,
    code: String,
    origin: ToolOrigin,
    sandbox: LuaSandbox,
    budget: Duration,
    descriptor: String,
}

impl LuaTool {
    pub fn new(
        spec: ToolSpec,
        code: impl Into<String>,
        origin: ToolOrigin,
        sandbox: LuaSandbox,
        budget: Duration,
    ) -> Self {
        let descriptor = spec.descriptor();
        Self {
            spec,
            code: code.into(),
            origin,
            sandbox,
            budget,
            descriptor,
        }
    }

    /// The tool's source code, as stored.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Check declared required parameters against a call's arguments.
    fn missing_params(&self, params: &serde_json::Value) -> Vec<String> {
        self.spec
            .params
            .iter()
            .filter(|p| p.required && params.get(&p.name).is_none())
            .map(|p| p.name.clone())
            .collect()
    }
}

#[async_trait]
impl Tool for LuaTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.spec.parameters_schema()
    }

    fn origin(&self) -> ToolOrigin {
        self.origin
    }

    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    async fn execute(&self, params: serde_json::Value) -> ExecutionResult {
        let missing = self.missing_params(&params);
        if !missing.is_empty() {
            return ExecutionResult::fail(
                &self.spec.name,
                params,
                ExceptionKind::ValidationError,
                format!("missing required parameters: {}", missing.join(", ")),
                Duration::ZERO,
            );
        }

        self.sandbox
            .run(&self.code, &self.spec.name, &params, self.budget)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::tools::tool::ToolParam;

    fn tool() -> LuaTool {
        let spec = ToolSpec {
            name: "c_to_f".to_string(),
            description: "Convert celsius to fahrenheit".to_string(),
            category: "conversion".to_string(),
            return_type: "number".to_string(),
            tags: Vec::new(),
            params: vec![ToolParam {
                name: "celsius".to_string(),
                description: "Temperature in celsius".to_string(),
                param_type: "number".to_string(),
                required: true,
            }],
        };
        let code = r#"
            function c_to_f(params)
                return params.celsius * 9 / 5 + 32
            end
        "#;
        LuaTool::new(
            spec,
            code,
            ToolOrigin::Generated,
            LuaSandbox::new(SandboxConfig::default()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn executes_through_sandbox() {
        let result = tool().execute(serde_json::json!({"celsius": 100})).await;
        assert!(result.success, "{:?}", result.failure);
        assert_eq!(result.output.unwrap(), serde_json::json!(212.0));
    }

    #[tokio::test]
    async fn missing_required_param_is_validation_failure() {
        let result = tool().execute(serde_json::json!({})).await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::ValidationError));
    }

    #[test]
    fn exposes_spec_schema() {
        let t = tool();
        assert_eq!(t.name(), "c_to_f");
        assert_eq!(t.origin(), ToolOrigin::Generated);
        assert_eq!(t.parameters_schema()["required"][0], "celsius");
    }
}
