//! Error types for the Versa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Versa operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors (fail fast, before any generator call) ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Collaborator errors (propagated unmodified, never retried) ---
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Retriever error: {0}")]
    Retriever(#[from] RetrieverError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error was raised before any collaborator was called.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Persona `{0}` is not supported. Choose from: Therapist, Comedian, Child, Expert, Default, DocBot")]
    UnknownPersona(String),

    #[error("Buffer length must be >= 0, got {0}")]
    NegativeBufferLen(i64),

    #[error("Unknown memory kind `{0}` (expected `buffer` or `summary_buffer`)")]
    UnknownMemoryKind(String),

    #[error("Template references placeholder `{{{placeholder}}}` but no value was supplied")]
    MissingPlaceholder { placeholder: String },

    #[error("Template for {persona} uses unsupported placeholder `{{{placeholder}}}`")]
    UnknownPlaceholder { persona: String, placeholder: String },

    #[error("Persona {0} requires a knowledge source but none is attached")]
    KnowledgeSourceRequired(String),
}

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by generator backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrieverError {
    #[error("Knowledge source unavailable: {0}")]
    Unavailable(String),
}
