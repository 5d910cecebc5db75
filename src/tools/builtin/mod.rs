//! Built-in tools compiled into the binary.
//!
//! These exist so a fresh session is never empty: the selector always
//! has a baseline to retrieve against, and tests have known-good tools
//! that need no model calls.

mod json;
mod time;

pub use json::{JsonDecodeTool, JsonEncodeTool};
pub use time::TimeTool;

use std::sync::Arc;

use crate::error::ToolError;
use crate::tools::registry::ToolRegistry;

/// Register every built-in tool.
pub async fn register_builtin_tools(registry: &ToolRegistry) -> Result<(), ToolError> {
    registry.register(Arc::new(TimeTool)).await?;
    registry.register(Arc::new(JsonEncodeTool)).await?;
    registry.register(Arc::new(JsonDecodeTool)).await?;
    tracing::info!(count = registry.count().await, "built-in tools registered");
    Ok(())
}

/// Pull a required string parameter out of a params object.
pub(crate) fn require_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing required string parameter '{}'", key))
}
