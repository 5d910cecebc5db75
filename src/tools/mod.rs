//! Tool system: the trait, the registry, built-ins, and generated tools.
//!
//! A tool is anything callable by name with JSON parameters that comes
//! back with an execution envelope. Built-ins are compiled in;
//! generated tools wrap sandboxed Lua produced by the creation
//! pipeline.

pub mod builtin;

mod lua_tool;
mod registry;
mod tool;

pub use lua_tool::LuaTool;
pub use registry::ToolRegistry;
pub use tool::{
    ExceptionKind, ExecutionFailure, ExecutionResult, Tool, ToolOrigin, ToolParam, ToolSchema,
    ToolSpec,
};
