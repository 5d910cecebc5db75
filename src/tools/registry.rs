//! Tool registry for the active session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::tools::tool::{ExceptionKind, ExecutionResult, Tool, ToolSchema};

/// Registry of callable tools, keyed by unique name.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool under its own name.
    ///
    /// Fails with `NamingConflict` if the name is taken; existing tools
    /// are never silently replaced.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) {
            return Err(ToolError::NamingConflict { name });
        }
        tools.insert(name.clone(), tool);
        tracing::debug!(name = %name, "registered tool");
        Ok(())
    }

    /// Replace a tool, registering it if absent.
    ///
    /// Used when a persisted tool is rewritten; callers decide when
    /// replacement is legitimate.
    pub async fn register_overwrite(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().await.insert(name.clone(), tool);
        tracing::debug!(name = %name, "registered tool (overwrite)");
    }

    /// Remove a tool. Returns the removed instance if it existed.
    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.write().await.remove(name)
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Check if a tool exists.
    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// List all tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub async fn count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Schemas for every registered tool, for model-facing listings.
    pub async fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .read()
            .await
            .values()
            .map(|t| t.schema())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a tool by name.
    ///
    /// Total over its inputs: an unknown name comes back as a failure
    /// envelope with kind `NotFound`, not an error.
    pub async fn dispatch(&self, name: &str, params: serde_json::Value) -> ExecutionResult {
        let tool = self.tools.read().await.get(name).cloned();
        match tool {
            Some(tool) => {
                tracing::debug!(name = %name, "dispatching tool");
                tool.execute(params).await
            }
            None => ExecutionResult::fail(
                name,
                params,
                ExceptionKind::NotFound,
                format!("tool '{}' is not registered", name),
                Duration::ZERO,
            ),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::sandbox::LuaSandbox;
    use crate::tools::builtin::TimeTool;
    use crate::tools::{LuaTool, ToolOrigin, ToolSpec};

    #[tokio::test]
    async fn register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(TimeTool)).await.unwrap();

        assert!(registry.has("current_time").await);
        assert!(registry.get("current_time").await.is_some());
        assert!(registry.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(TimeTool)).await.unwrap();

        let err = registry.register(Arc::new(TimeTool)).await.unwrap_err();
        assert!(matches!(err, ToolError::NamingConflict { name } if name == "current_time"));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn dispatch_unknown_is_not_found_envelope() {
        let registry = ToolRegistry::new();
        let result = registry.dispatch("ghost", serde_json::json!({})).await;

        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::NotFound));
        assert_eq!(result.tool_name, "ghost");
    }

    #[tokio::test]
    async fn overwrite_replaces_callable() {
        let registry = ToolRegistry::new();
        let sandbox = LuaSandbox::new(SandboxConfig::default());
        let spec = ToolSpec {
            name: "answer".to_string(),
            description: "Return a constant".to_string(),
            category: "misc".to_string(),
            return_type: "number".to_string(),
            tags: Vec::new(),
            params: Vec::new(),
        };

        let first = LuaTool::new(
            spec.clone(),
            "function answer(params)\n    return 1\nend",
            ToolOrigin::Generated,
            sandbox.clone(),
            Duration::from_secs(2),
        );
        let second = LuaTool::new(
            spec,
            "function answer(params)\n    return 2\nend",
            ToolOrigin::Stored,
            sandbox,
            Duration::from_secs(2),
        );

        registry.register(Arc::new(first)).await.unwrap();
        registry.register_overwrite(Arc::new(second)).await;

        assert_eq!(registry.count().await, 1);
        let result = registry.dispatch("answer", serde_json::json!({})).await;
        assert!(result.success);
        assert_eq!(result.output, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn schemas_are_sorted() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(crate::tools::builtin::JsonDecodeTool))
            .await
            .unwrap();
        registry.register(Arc::new(TimeTool)).await.unwrap();

        let schemas = registry.schemas().await;
        assert_eq!(schemas.len(), 2);
        assert!(schemas[0].name < schemas[1].name);
    }
}
