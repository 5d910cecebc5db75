//! Static validation of generated tool code.
//!
//! Validation never executes the code: the chunk is compiled in a bare
//! VM to catch parse errors, then scanned for the structural rules the
//! runtime relies on. Findings are classified with the same taxonomy
//! as execution failures so the repair loop can key hints off them.

use std::sync::OnceLock;

use mlua::{Lua, LuaOptions, StdLib};
use regex::Regex;

use crate::tools::ExceptionKind;

/// Outcome of static validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub kind: Option<ExceptionKind>,
    pub message: Option<String>,
    /// Source line of the finding, when known.
    pub line: Option<u32>,
}

impl ValidationResult {
    pub(crate) fn pass() -> Self {
        Self {
            passed: true,
            kind: None,
            message: None,
            line: None,
        }
    }

    pub(crate) fn fail(kind: ExceptionKind, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            passed: false,
            kind: Some(kind),
            message: Some(message.into()),
            line,
        }
    }

    /// One-line description for prompts and logs.
    pub fn summary(&self) -> String {
        match (&self.kind, &self.message) {
            (Some(kind), Some(msg)) => match self.line {
                Some(line) => format!("{} at line {}: {}", kind, line, msg),
                None => format!("{}: {}", kind, msg),
            },
            _ => "passed".to_string(),
        }
    }
}

fn global_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
    })
}

fn forbidden_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The name must start a reference chain: `params.os.name` is a
    // field access, not the os library.
    RE.get_or_init(|| {
        Regex::new(
            r"(?:\A|[^\w.])((?:os|io)\s*\.|(?:require|dofile|loadfile|loadstring|load)\s*\()",
        )
        .unwrap()
    })
}

fn line_in_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":(\d+):").unwrap())
}

/// Validate generated code without running it.
///
/// Checks, in order: the chunk parses, it does not reference host
/// facilities the sandbox withholds, and it defines a global function
/// named `entry_point`.
pub fn validate(code: &str, entry_point: &str) -> ValidationResult {
    if code.trim().is_empty() {
        return ValidationResult::fail(
            ExceptionKind::ValidationError,
            "generated code is empty",
            None,
        );
    }

    // Compile only. A bare VM keeps this cheap and side-effect free.
    let lua = match Lua::new_with(StdLib::NONE, LuaOptions::default()) {
        Ok(lua) => lua,
        Err(e) => {
            return ValidationResult::fail(
                ExceptionKind::ValidationError,
                format!("validator setup failed: {}", e),
                None,
            )
        }
    };
    if let Err(e) = lua.load(code).set_name("tool").into_function() {
        let message = match &e {
            mlua::Error::SyntaxError { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let line = line_in_error_re()
            .captures(&message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        return ValidationResult::fail(ExceptionKind::SyntaxError, message, line);
    }

    if let Some(m) = forbidden_re().captures(code).and_then(|c| c.get(1)) {
        let line = code[..m.start()].matches('\n').count() as u32 + 1;
        return ValidationResult::fail(
            ExceptionKind::ValidationError,
            format!(
                "references unavailable facility '{}'",
                m.as_str().trim_end_matches(['.', '(', ' '])
            ),
            Some(line),
        );
    }

    let defined: Vec<&str> = global_fn_re()
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    if !defined.iter().any(|name| *name == entry_point) {
        return ValidationResult::fail(
            ExceptionKind::ValidationError,
            format!(
                "no global function named '{}' (found: {})",
                entry_point,
                if defined.is_empty() {
                    "none".to_string()
                } else {
                    defined.join(", ")
                }
            ),
            None,
        );
    }

    ValidationResult::pass()
}
