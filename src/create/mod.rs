//! Tool creation pipeline.
//!
//! Turns a task description into working tool code in four stages:
//! analyze the task into a spec, retrieve documentation passages for
//! context, generate code, then check with a bounded repair loop. Each
//! check statically validates the code and then test-runs it in the
//! sandbox with placeholder arguments, so nothing is ever accepted
//! unexecuted. Repair prompts carry a hint keyed to the failure kind,
//! so the model is told what class of mistake to fix rather than just
//! shown the message.

use std::sync::Arc;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::error::{Error, PipelineError};
use crate::index::docs::DocsIndex;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::sandbox::LuaSandbox;
use crate::tools::{ExceptionKind, ToolRegistry, ToolSpec};
use crate::validate::{validate, ValidationResult};

/// A checked tool ready to register and persist.
#[derive(Debug, Clone)]
pub struct CreatedTool {
    pub spec: ToolSpec,
    pub code: String,
    /// Repair generations spent, 0 when the first attempt passed.
    pub repair_iterations: u32,
}

/// The creation pipeline.
pub struct ToolPipeline {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    docs: Option<Arc<DocsIndex>>,
    sandbox: LuaSandbox,
    config: PipelineConfig,
}

impl ToolPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        docs: Option<Arc<DocsIndex>>,
        sandbox: LuaSandbox,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            docs,
            sandbox,
            config,
        }
    }

    /// Create a tool for a task the registry cannot serve.
    pub async fn create(&self, task: &str) -> Result<CreatedTool, Error> {
        let spec = self.analyze(task).await?;
        tracing::info!(name = %spec.name, category = %spec.category, "task analyzed");

        let doc_context = self.retrieve_docs(task).await;

        let mut code = self.generate(&spec, task, &doc_context, None).await?;
        let mut last_failure: Option<ValidationResult> = None;

        // The bound counts check attempts, so `max` attempts means at
        // most `max - 1` repair generations.
        for attempt in 1..=self.config.max_repair_iterations {
            let result = self.check(&spec, &code).await;
            if result.passed {
                return Ok(CreatedTool {
                    spec,
                    code,
                    repair_iterations: attempt - 1,
                });
            }

            tracing::warn!(
                name = %spec.name,
                attempt,
                finding = %result.summary(),
                "generated code failed its checks"
            );

            if attempt == self.config.max_repair_iterations {
                last_failure = Some(result);
                break;
            }

            code = self
                .generate(&spec, task, &doc_context, Some((&code, &result)))
                .await?;
            last_failure = Some(result);
        }

        let last = last_failure
            .map(|r| r.summary())
            .unwrap_or_else(|| "unknown".to_string());
        Err(Error::Pipeline(PipelineError::RepairExhausted {
            iterations: self.config.max_repair_iterations,
            last_error: last,
        }))
    }

    /// One check attempt: static validation, then a sandboxed test run
    /// with placeholder arguments.
    ///
    /// Failures from both stages come back in the same classified shape
    /// so the repair prompt can key its hint off either.
    async fn check(&self, spec: &ToolSpec, code: &str) -> ValidationResult {
        let result = validate(code, &spec.name);
        if !result.passed {
            return result;
        }

        let params = sample_params(spec);
        let run = self
            .sandbox
            .run(code, &spec.name, &params, self.config.smoke_execution_time)
            .await;
        if run.success {
            return ValidationResult::pass();
        }

        match run.failure {
            Some(failure) => ValidationResult::fail(
                failure.kind,
                format!("test run with {} failed: {}", params, failure.message),
                failure.line_number,
            ),
            None => ValidationResult::fail(
                ExceptionKind::RuntimeError,
                "test run failed without detail",
                None,
            ),
        }
    }

    /// Stage 1: analyze the task into a tool spec.
    async fn analyze(&self, task: &str) -> Result<ToolSpec, Error> {
        let system = "You design small, single-purpose tools. Given a task, \
                      produce the spec of one tool that accomplishes it: a \
                      snake_case name, a one-sentence description written for \
                      retrieval, a short category, the JSON type it returns, \
                      retrieval tags, and the parameters the tool needs.";
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "snake_case identifier"},
                "description": {"type": "string"},
                "category": {"type": "string", "description": "short storage category like 'conversion' or 'text'"},
                "return_type": {"type": "string", "description": "JSON type of the returned value"},
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "short retrieval keywords"
                },
                "params": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "type": {"type": "string"},
                            "required": {"type": "boolean"}
                        },
                        "required": ["name", "description", "type"]
                    }
                }
            },
            "required": ["name", "description", "category", "return_type", "params"]
        });

        let response = self
            .llm
            .complete_structured(
                CompletionRequest::new(Some(system), format!("Task: {}", task)),
                "tool_spec",
                &schema,
            )
            .await
            .map_err(Error::Llm)?;

        let mut spec: ToolSpec = serde_json::from_value(response)
            .map_err(|e| PipelineError::AnalysisFailed(format!("malformed spec: {}", e)))?;

        spec.name = sanitize_name(&spec.name)
            .ok_or_else(|| PipelineError::AnalysisFailed(format!("unusable name '{}'", spec.name)))?;
        spec.category = sanitize_name(&spec.category).unwrap_or_else(|| "general".to_string());

        // A name collision with a live tool is resolved here, before any
        // code exists, by suffixing. The registry itself never overwrites.
        spec.name = self.dedupe_name(spec.name).await;

        Ok(spec)
    }

    async fn dedupe_name(&self, base: String) -> String {
        if !self.registry.has(&base).await {
            return base;
        }
        for i in 2.. {
            let candidate = format!("{}_{}", base, i);
            if !self.registry.has(&candidate).await {
                tracing::debug!(base = %base, renamed = %candidate, "resolved name collision");
                return candidate;
            }
        }
        unreachable!()
    }

    /// Stage 2: pull documentation passages relevant to the task.
    ///
    /// Doc retrieval failing only degrades the prompt, never the
    /// pipeline.
    async fn retrieve_docs(&self, task: &str) -> Vec<String> {
        let Some(docs) = &self.docs else {
            return Vec::new();
        };
        match docs
            .retrieve(task, self.config.docs_top_k, self.config.docs_score_cutoff)
            .await
        {
            Ok(passages) => passages.into_iter().map(|p| p.text).collect(),
            Err(e) => {
                tracing::warn!("doc retrieval failed, generating without context: {}", e);
                Vec::new()
            }
        }
    }

    /// Stage 3 (and repairs): generate tool code.
    async fn generate(
        &self,
        spec: &ToolSpec,
        task: &str,
        doc_context: &[String],
        repair: Option<(&str, &ValidationResult)>,
    ) -> Result<String, Error> {
        let system = "You write Lua 5.4 tool implementations. Rules: define \
                      exactly one global function with the requested name, \
                      taking a single table argument named params; return a \
                      JSON-representable value; use only the string, table, \
                      math, and utf8 libraries; never use os, io, require, \
                      load, or dofile.";

        let mut user = format!(
            "Task: {}\n\nTool spec:\n{}\n\nWrite the complete Lua source for \
             the global function `{}`.",
            task,
            serde_json::to_string_pretty(spec)
                .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?,
            spec.name,
        );

        if !doc_context.is_empty() {
            user.push_str("\n\nReference material:\n");
            for passage in doc_context {
                user.push_str("---\n");
                user.push_str(passage);
                user.push('\n');
            }
        }

        if let Some((previous, failure)) = repair {
            user.push_str(&format!(
                "\n\nYour previous attempt did not pass its checks.\nFinding: {}\nHint: {}\n\nPrevious code:\n{}\n\nProduce a corrected version.",
                failure.summary(),
                repair_hint(failure.kind),
                previous,
            ));
        }

        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Complete Lua source"}
            },
            "required": ["code"]
        });

        let response = self
            .llm
            .complete_structured(
                CompletionRequest::new(Some(system), user),
                "tool_code",
                &schema,
            )
            .await
            .map_err(Error::Llm)?;

        let code = response
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::GenerationFailed("response carried no code".to_string()))?;

        Ok(strip_code_fence(code).to_string())
    }
}

/// Hint shown to the model for each failure class.
fn repair_hint(kind: Option<ExceptionKind>) -> &'static str {
    match kind {
        Some(ExceptionKind::SyntaxError) => {
            "fix the parse error; check that every function, if, and for has a matching end"
        }
        Some(ExceptionKind::ValidationError) => {
            "define exactly one global function with the requested name taking a single params \
             table, and remove any use of os, io, require, load, or dofile"
        }
        Some(ExceptionKind::RuntimeError) => {
            "guard against nil values and wrong types before using params fields"
        }
        Some(ExceptionKind::TimeoutError) => {
            "remove unbounded loops; every loop must have a terminating condition"
        }
        Some(ExceptionKind::MemoryError) => {
            "avoid accumulating large tables or strings; process input incrementally"
        }
        _ => "correct the reported problem without changing the function's name or signature",
    }
}

/// Placeholder arguments for the test run, one per required parameter.
fn sample_params(spec: &ToolSpec) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for p in spec.params.iter().filter(|p| p.required) {
        map.insert(p.name.clone(), sample_value(&p.param_type));
    }
    serde_json::Value::Object(map)
}

fn sample_value(param_type: &str) -> serde_json::Value {
    match param_type {
        "number" | "integer" => serde_json::json!(1),
        "boolean" => serde_json::json!(true),
        "array" => serde_json::json!([]),
        "object" => serde_json::json!({}),
        _ => serde_json::json!("example"),
    }
}

/// Normalize an identifier to snake_case ASCII, or reject it entirely.
fn sanitize_name(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let collapsed = Regex::new(r"_+")
        .expect("static regex")
        .replace_all(&cleaned, "_")
        .trim_matches('_')
        .to_string();
    if collapsed.is_empty() || collapsed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(collapsed)
}

/// Drop a surrounding markdown code fence if the model added one.
fn strip_code_fence(code: &str) -> &str {
    let trimmed = code.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("lua").unwrap_or(rest);
        if let Some(body) = rest.strip_suffix("```") {
            return body.trim();
        }
    }
    trimmed
}
