//! Sandboxed Lua execution for generated tool code.
//!
//! Every run gets a fresh VM with a whitelisted stdlib, a memory cap,
//! and a wall-clock deadline enforced through an instruction-count
//! hook. Nothing from one run is visible to the next, and host
//! facilities (files, network, process control) are simply never
//! loaded.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib, Value as LuaValue, VmState};
use regex::Regex;

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::tools::{ExceptionKind, ExecutionResult};

/// Hard cap on VM heap growth per run.
const MEMORY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Grace added to the blocking-task backstop beyond the VM deadline.
const BACKSTOP_GRACE: Duration = Duration::from_secs(2);

/// Marker the deadline hook raises with, matched during classification.
const DEADLINE_MARKER: &str = "execution deadline exceeded";

/// Sandboxed Lua interpreter.
///
/// Cheap to clone per call site; all state lives in the per-run VM.
#[derive(Clone)]
pub struct LuaSandbox {
    config: SandboxConfig,
}

impl LuaSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Run `code`, then call the global function `entry_point` with
    /// `params` converted to a Lua table.
    ///
    /// Total over its inputs: every failure mode comes back inside the
    /// envelope. `budget` is the wall-clock deadline for the whole run.
    pub async fn run(
        &self,
        code: &str,
        entry_point: &str,
        params: &serde_json::Value,
        budget: Duration,
    ) -> ExecutionResult {
        let config = self.config.clone();

        let start = Instant::now();
        let handle = tokio::task::spawn_blocking({
            let code = code.to_string();
            let entry_point = entry_point.to_string();
            let params = params.clone();
            move || run_blocking(&config, &code, &entry_point, &params, budget)
        });

        // The hook enforces the deadline inside the VM; this backstop
        // only catches a hook that never fires (e.g. blocked in a C call).
        match tokio::time::timeout(budget + BACKSTOP_GRACE, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::RuntimeError,
                format!("sandbox task panicked: {}", join_err),
                start.elapsed(),
            ),
            Err(_) => ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::TimeoutError,
                format!("execution exceeded {:?}", budget),
                start.elapsed(),
            ),
        }
    }
}

fn run_blocking(
    config: &SandboxConfig,
    code: &str,
    entry_point: &str,
    params: &serde_json::Value,
    budget: Duration,
) -> ExecutionResult {
    let start = Instant::now();
    let logs = Arc::new(Mutex::new(Vec::new()));

    let lua = match build_vm(config, budget, Arc::clone(&logs)) {
        Ok(lua) => lua,
        Err(e) => {
            return ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::ValidationError,
                format!("sandbox setup failed: {}", e),
                start.elapsed(),
            )
        }
    };

    let captured = move || logs.lock().map(|l| l.clone()).unwrap_or_default();

    // Load the chunk. Parse failures surface here.
    if let Err(e) = lua.load(code).set_name("tool").exec() {
        let failure = classify_lua_error(&e, budget);
        return ExecutionResult::fail(
            entry_point,
            params.clone(),
            failure.kind,
            failure.message,
            start.elapsed(),
        )
        .with_failure_detail(failure.traceback, failure.line)
        .with_logs(captured());
    }

    let func: mlua::Function = match lua.globals().get(entry_point) {
        Ok(f) => f,
        Err(_) => {
            return ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::ValidationError,
                format!("global function '{}' is not defined", entry_point),
                start.elapsed(),
            )
            .with_logs(captured())
        }
    };

    let lua_params = match lua.to_value(params) {
        Ok(v) => v,
        Err(e) => {
            return ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::ValidationError,
                format!("parameters not representable in the interpreter: {}", e),
                start.elapsed(),
            )
            .with_logs(captured())
        }
    };

    match func.call::<LuaValue>(lua_params) {
        Ok(value) => match lua.from_value::<serde_json::Value>(value) {
            Ok(output) => ExecutionResult::ok(
                entry_point,
                params.clone(),
                output,
                captured(),
                start.elapsed(),
            ),
            Err(e) => ExecutionResult::fail(
                entry_point,
                params.clone(),
                ExceptionKind::RuntimeError,
                format!("return value not representable as JSON: {}", e),
                start.elapsed(),
            )
            .with_logs(captured()),
        },
        Err(e) => {
            let failure = classify_lua_error(&e, budget);
            ExecutionResult::fail(
                entry_point,
                params.clone(),
                failure.kind,
                failure.message,
                start.elapsed(),
            )
            .with_failure_detail(failure.traceback, failure.line)
            .with_logs(captured())
        }
    }
}

/// Build a fresh VM with the whitelist, print capture, memory cap, and
/// deadline hook installed.
fn build_vm(
    config: &SandboxConfig,
    budget: Duration,
    logs: Arc<Mutex<Vec<String>>>,
) -> Result<Lua, SandboxError> {
    let libs = stdlib_flags(&config.allowed_libs)?;
    let lua = Lua::new_with(libs, LuaOptions::default())
        .map_err(|e| SandboxError::Setup(e.to_string()))?;

    lua.set_memory_limit(MEMORY_LIMIT_BYTES)
        .map_err(|e| SandboxError::Setup(e.to_string()))?;

    // The base library ships loaders and raw eval; generated code gets
    // none of them.
    let globals = lua.globals();
    for name in ["load", "loadstring", "dofile", "loadfile", "require"] {
        globals
            .set(name, LuaValue::Nil)
            .map_err(|e| SandboxError::Setup(e.to_string()))?;
    }

    // Replace print with a capture buffer.
    let print = lua
        .create_function(move |_, args: mlua::Variadic<LuaValue>| {
            let line = args
                .iter()
                .map(|v| v.to_string().unwrap_or_else(|_| "<value>".to_string()))
                .collect::<Vec<_>>()
                .join("\t");
            if let Ok(mut logs) = logs.lock() {
                logs.push(line);
            }
            Ok(())
        })
        .map_err(|e| SandboxError::Setup(e.to_string()))?;
    globals
        .set("print", print)
        .map_err(|e| SandboxError::Setup(e.to_string()))?;

    let deadline = Instant::now() + budget;
    lua.set_hook(
        mlua::HookTriggers::new().every_nth_instruction(config.instruction_interval),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                Err(mlua::Error::RuntimeError(DEADLINE_MARKER.to_string()))
            } else {
                Ok(VmState::Continue)
            }
        },
    );

    Ok(lua)
}

/// Translate a library whitelist into mlua stdlib flags.
fn stdlib_flags(allowed: &[String]) -> Result<StdLib, SandboxError> {
    let mut flags = StdLib::NONE;
    for name in allowed {
        flags |= match name.as_str() {
            "string" => StdLib::STRING,
            "table" => StdLib::TABLE,
            "math" => StdLib::MATH,
            "utf8" => StdLib::UTF8,
            "coroutine" => StdLib::COROUTINE,
            other => return Err(SandboxError::UnknownLibrary(other.to_string())),
        };
    }
    Ok(flags)
}

/// Classified interpreter failure with whatever detail the error carried.
struct LuaFailure {
    kind: ExceptionKind,
    message: String,
    traceback: Option<String>,
    line: Option<u32>,
}

impl LuaFailure {
    fn new(kind: ExceptionKind, raw: String) -> Self {
        // Lua appends the stack trace to the message; keep them apart so
        // the envelope's message stays one line.
        let (message, traceback) = match raw.find("stack traceback:") {
            Some(pos) => (
                raw[..pos].trim_end().to_string(),
                Some(raw[pos..].to_string()),
            ),
            None => (raw, None),
        };
        let line = error_line_re()
            .captures(&message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        Self {
            kind,
            message,
            traceback,
            line,
        }
    }

    fn timeout(budget: Duration) -> Self {
        Self {
            kind: ExceptionKind::TimeoutError,
            message: format!("execution exceeded {:?}", budget),
            traceback: None,
            line: None,
        }
    }
}

fn error_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":(\d+):").expect("static regex"))
}

/// Map an interpreter error onto the failure taxonomy.
fn classify_lua_error(err: &mlua::Error, budget: Duration) -> LuaFailure {
    match err {
        mlua::Error::SyntaxError { message, .. } => {
            LuaFailure::new(ExceptionKind::SyntaxError, message.clone())
        }
        mlua::Error::MemoryError(m) => LuaFailure::new(ExceptionKind::MemoryError, m.clone()),
        mlua::Error::CallbackError { cause, .. } => classify_lua_error(cause, budget),
        mlua::Error::RuntimeError(m) if m.contains(DEADLINE_MARKER) => {
            LuaFailure::timeout(budget)
        }
        other => {
            let message = other.to_string();
            if message.contains(DEADLINE_MARKER) {
                LuaFailure::timeout(budget)
            } else {
                LuaFailure::new(ExceptionKind::RuntimeError, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> LuaSandbox {
        LuaSandbox::new(SandboxConfig::default())
    }

    fn budget() -> Duration {
        Duration::from_secs(2)
    }

    #[tokio::test]
    async fn runs_simple_function() {
        let code = r#"
            function double(params)
                return params.n * 2
            end
        "#;
        let result = sandbox()
            .run(code, "double", &serde_json::json!({"n": 21}), budget())
            .await;
        assert!(result.success, "{:?}", result.failure);
        assert_eq!(result.output.unwrap(), serde_json::json!(42));
        assert_eq!(result.tool_name, "double");
        assert_eq!(result.parameters_used, serde_json::json!({"n": 21}));
    }

    #[tokio::test]
    async fn syntax_error_is_classified() {
        let result = sandbox()
            .run("function broken(", "broken", &serde_json::json!({}), budget())
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::SyntaxError));
    }

    #[tokio::test]
    async fn runtime_error_is_classified() {
        let code = r#"
            function explode(params)
                return nil + 1
            end
        "#;
        let result = sandbox()
            .run(code, "explode", &serde_json::json!({}), budget())
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::RuntimeError));
        let failure = result.failure.unwrap();
        assert_eq!(failure.line_number, Some(3));
        assert!(!failure.message.contains("stack traceback"));
    }

    #[tokio::test]
    async fn missing_entry_point_is_validation_error() {
        let result = sandbox()
            .run("local x = 1", "do_thing", &serde_json::json!({}), budget())
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::ValidationError));
    }

    #[tokio::test]
    async fn infinite_loop_hits_deadline() {
        let code = r#"
            function spin(params)
                while true do end
            end
        "#;
        let result = sandbox()
            .run(code, "spin", &serde_json::json!({}), Duration::from_millis(200))
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(ExceptionKind::TimeoutError));
    }

    #[tokio::test]
    async fn print_output_is_captured() {
        let code = r#"
            function chatty(params)
                print("step", 1)
                print("step", 2)
                return true
            end
        "#;
        let result = sandbox()
            .run(code, "chatty", &serde_json::json!({}), budget())
            .await;
        assert!(result.success);
        assert_eq!(result.logs, vec!["step\t1", "step\t2"]);
    }

    #[tokio::test]
    async fn host_facilities_are_absent() {
        let code = r#"
            function inspect(params)
                return {
                    os = os == nil,
                    io = io == nil,
                    load = load == nil,
                    require = require == nil,
                }
            end
        "#;
        let result = sandbox()
            .run(code, "inspect", &serde_json::json!({}), budget())
            .await;
        assert!(result.success);
        let out = result.output.unwrap();
        assert_eq!(out["os"], true);
        assert_eq!(out["io"], true);
        assert_eq!(out["load"], true);
        assert_eq!(out["require"], true);
    }

    #[tokio::test]
    async fn whitelisted_libs_are_present() {
        let code = r#"
            function upper(params)
                return string.upper(params.text)
            end
        "#;
        let result = sandbox()
            .run(code, "upper", &serde_json::json!({"text": "abc"}), budget())
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap(), serde_json::json!("ABC"));
    }

    #[tokio::test]
    async fn state_does_not_leak_between_runs() {
        let sb = sandbox();
        let set = r#"
            function set_it(params)
                leaked = "secret"
                return true
            end
        "#;
        let get = r#"
            function get_it(params)
                return leaked == nil
            end
        "#;
        assert!(sb.run(set, "set_it", &serde_json::json!({}), budget()).await.success);
        let result = sb.run(get, "get_it", &serde_json::json!({}), budget()).await;
        assert!(result.success);
        assert_eq!(result.output.unwrap(), serde_json::json!(true));
    }

    #[test]
    fn unknown_library_rejected() {
        let err = stdlib_flags(&["os".to_string()]).unwrap_err();
        assert!(matches!(err, SandboxError::UnknownLibrary(name) if name == "os"));
    }
}
