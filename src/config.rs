//! Environment-driven configuration.
//!
//! All settings come from environment variables (with `.env` support via
//! `dotenvy`). Each component gets its own config struct; `Config::from_env`
//! assembles the whole set once at session start.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub sandbox: SandboxConfig,
    pub selector: SelectorConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best effort: a missing .env file is fine.
        let _ = dotenvy::dotenv();

        Ok(Self {
            llm: LlmConfig::from_env()?,
            embeddings: EmbeddingsConfig::from_env()?,
            sandbox: SandboxConfig::from_env()?,
            selector: SelectorConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            agent: AgentConfig::from_env()?,
        })
    }
}

/// Inference gateway configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Transport-level retries for transient HTTP failures.
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl LlmConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: optional_env("TOOLWRIGHT_LLM_BASE_URL")?
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key: optional_env("TOOLWRIGHT_LLM_API_KEY")?
                .or(optional_env("OPENAI_API_KEY")?)
                .map(SecretString::from),
            model: optional_env("TOOLWRIGHT_LLM_MODEL")?
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_retries: parse_env("TOOLWRIGHT_LLM_MAX_RETRIES", 2)?,
            request_timeout: Duration::from_secs(parse_env(
                "TOOLWRIGHT_LLM_TIMEOUT_SECS",
                120u64,
            )?),
        })
    }
}

/// Embeddings provider configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// Provider to use: "openai" or "local".
    pub provider: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Embedding vector dimension. Inferred from the model name when not set.
    pub dimension: usize,
}

impl EmbeddingsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider =
            optional_env("TOOLWRIGHT_EMBEDDING_PROVIDER")?.unwrap_or_else(|| "local".to_string());
        let model = optional_env("TOOLWRIGHT_EMBEDDING_MODEL")?
            .unwrap_or_else(|| default_model_for_provider(&provider).to_string());
        let dimension = parse_env(
            "TOOLWRIGHT_EMBEDDING_DIMENSION",
            default_dimension_for_model(&model),
        )?;

        Ok(Self {
            provider,
            api_key: optional_env("OPENAI_API_KEY")?.map(SecretString::from),
            model,
            dimension,
        })
    }
}

fn default_model_for_provider(provider: &str) -> &'static str {
    match provider {
        "openai" => "text-embedding-3-small",
        _ => "all-MiniLM-L6-v2",
    }
}

/// Infer the embedding dimension from a well-known model name.
fn default_dimension_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        "all-MiniLM-L6-v2" => 384,
        _ => 1536,
    }
}

/// Sandboxed interpreter configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for a sandboxed run of untrusted code.
    pub max_execution_time: Duration,
    /// Wall-clock budget for trusted (registered) tool runs.
    pub trusted_execution_time: Duration,
    /// Lua stdlib groups exposed to generated code.
    pub allowed_libs: Vec<String>,
    /// How many VM instructions between deadline checks.
    pub instruction_interval: u32,
}

impl SandboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let allowed = optional_env("TOOLWRIGHT_SANDBOX_LIBS")?
            .unwrap_or_else(|| "string,table,math,utf8".to_string());

        Ok(Self {
            max_execution_time: Duration::from_secs(parse_env(
                "TOOLWRIGHT_SANDBOX_TIMEOUT_SECS",
                30u64,
            )?),
            trusted_execution_time: Duration::from_secs(parse_env(
                "TOOLWRIGHT_TRUSTED_TIMEOUT_SECS",
                60u64,
            )?),
            allowed_libs: allowed
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            instruction_interval: parse_env("TOOLWRIGHT_SANDBOX_HOOK_INTERVAL", 10_000u32)?,
        })
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_execution_time: Duration::from_secs(30),
            trusted_execution_time: Duration::from_secs(60),
            allowed_libs: ["string", "table", "math", "utf8"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            instruction_interval: 10_000,
        }
    }
}

/// Two-phase tool selector configuration.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Candidates to retrieve in phase 1.
    pub top_k: usize,
    /// Cosine-distance cutoff; candidates above it are dropped.
    pub score_cutoff: f32,
}

impl SelectorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            top_k: parse_env("TOOLWRIGHT_SELECTOR_TOP_K", 5usize)?,
            score_cutoff: parse_env("TOOLWRIGHT_SELECTOR_CUTOFF", 0.7f32)?,
        })
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_cutoff: 0.7,
        }
    }
}

/// Tool creation pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded check/repair attempts (each attempt validates once).
    pub max_repair_iterations: u32,
    /// Wall-clock budget for the sandboxed test run of a candidate.
    pub smoke_execution_time: Duration,
    /// Reference documentation passages to retrieve for codegen context.
    pub docs_top_k: usize,
    /// Distance cutoff for doc retrieval.
    pub docs_score_cutoff: f32,
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_repair_iterations: parse_env("TOOLWRIGHT_MAX_REPAIR_ITERATIONS", 3u32)?,
            smoke_execution_time: Duration::from_secs(parse_env(
                "TOOLWRIGHT_SMOKE_TIMEOUT_SECS",
                10u64,
            )?),
            docs_top_k: parse_env("TOOLWRIGHT_DOCS_TOP_K", 5usize)?,
            docs_score_cutoff: parse_env("TOOLWRIGHT_DOCS_CUTOFF", 0.8f32)?,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repair_iterations: 3,
            smoke_execution_time: Duration::from_secs(10),
            docs_top_k: 5,
            docs_score_cutoff: 0.8,
        }
    }
}

/// Durable tool storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for stored tools (`<root>/<category>/<name>.lua`).
    pub storage_root: PathBuf,
    /// Directory of reference documentation passages (one per file).
    pub docs_dir: Option<PathBuf>,
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let storage_root = match optional_env("TOOLWRIGHT_STORAGE_ROOT")? {
            Some(p) => PathBuf::from(p),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("toolwright")
                .join("tools"),
        };

        Ok(Self {
            storage_root,
            docs_dir: optional_env("TOOLWRIGHT_DOCS_DIR")?.map(PathBuf::from),
        })
    }
}

/// Agent loop configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum decide/act iterations per task.
    pub max_iterations: u32,
}

impl AgentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_iterations: parse_env("TOOLWRIGHT_MAX_ITERATIONS", 10u32)?,
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

/// Read an optional environment variable, treating empty as unset.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "not valid unicode".to_string(),
        }),
    }
}

/// Read and parse an environment variable, falling back to a default.
pub(crate) fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match optional_env(key)? {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse '{}'", raw),
        }),
        None => Ok(default),
    }
}
