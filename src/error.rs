//! Error types for Toolwright.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inference gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Structured response missing required property '{property}'")]
    SchemaMismatch { property: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Embedding provider errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Text too long: {length} > {max}")]
    TextTooLong { length: usize, max: usize },

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        EmbeddingError::Http(e.to_string())
    }
}

/// Similarity index errors.
///
/// Callers are expected to degrade to "no candidates" on `Unavailable`
/// rather than letting it cross a component boundary.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Similarity index unavailable: {0}")]
    Unavailable(String),

    #[error("Entry not found: {0}")]
    NotFound(String),
}

/// Tool registry and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Tool name {name} already registered")]
    NamingConflict { name: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Sandboxed interpreter errors.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Unknown sandbox library: {0}")]
    UnknownLibrary(String),

    #[error("Interpreter setup failed: {0}")]
    Setup(String),

    #[error("Execution deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Interpreter error: {0}")]
    Interpreter(String),
}

/// Durable tool storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Side-index corrupt: {0}")]
    CorruptIndex(String),

    #[error("Tool {name} not found in storage")]
    NotFound { name: String },

    #[error("Partial store of {name}: completed [{completed}], failed at {failed}: {reason}")]
    Partial {
        name: String,
        completed: String,
        failed: String,
        reason: String,
    },
}

/// Tool creation pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Task analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Code generation failed: {0}")]
    GenerationFailed(String),

    #[error("Repair loop exhausted after {iterations} iterations: {last_error}")]
    RepairExhausted {
        iterations: u32,
        last_error: String,
    },
}

/// Agent loop errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Decision step failed: {0}")]
    DecisionFailed(String),

    #[error("Maximum iterations ({max}) reached without finishing")]
    MaxIterations { max: u32 },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
