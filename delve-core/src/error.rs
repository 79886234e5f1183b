//! Error types for the Delve research core.
//!
//! Uses `thiserror` for public API error types. Raw backend failures
//! (`GenerationError`) are kept separate from the research taxonomy
//! (`ResearchError`) so that classification happens at the provider boundary.

/// Top-level error type for the Delve core library.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw failures reported by a text-generation backend before classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP {status} from backend: {body}")]
    Http { status: u16, body: String },

    #[error("Backend connection failed: {message}")]
    Connection { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Response blocked by backend: {reason}")]
    Blocked { reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Violations of the research run state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Sub-topics were already generated for this run")]
    SubTopicsAlreadySet,

    #[error("Brainstorming produced no sub-topics")]
    NoSubTopics,

    #[error("Unknown sub-topic index {index} (run has {len})")]
    UnknownSubTopic { index: usize, len: usize },

    #[error("Run already finished in phase {phase}")]
    Terminal { phase: String },
}

/// Failure taxonomy for a single unit of research work.
///
/// Every variant is contained at the smallest unit: a failed sub-topic,
/// a degraded report, or the brainstorm fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    #[error("Search tool not supported: {message}")]
    CapabilityUnsupported { message: String },

    #[error("Rate limited by backend")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Transient backend error: {message}")]
    TransientBackend { message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Backend error: {message}")]
    FatalBackend { message: String },

    #[error("Retry budget exhausted after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },
}

/// A type alias for results using the top-level `DelveError`.
pub type Result<T> = std::result::Result<T, DelveError>;
