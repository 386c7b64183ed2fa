//! Shared error taxonomy, composed at crate boundaries with `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lock timeout acquiring {path}")]
    LockTimeout { path: String },

    #[error("context overflow")]
    ContextOverflow,

    #[error("tool failure: {0}")]
    ToolFailure(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid config: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Matches spec.md's `/context_length|too long|maximum context|context window/`
    /// detection rule against a provider error message.
    pub fn is_context_overflow_message(message: &str) -> bool {
        static PATTERNS: &[&str] = &[
            "context_length",
            "too long",
            "maximum context",
            "context window",
        ];
        let lower = message.to_lowercase();
        PATTERNS.iter().any(|p| lower.contains(p))
    }
}
