//! Error types for snipbox.
//!
//! Failures of the *user's code* (exceptions, timeouts) are not errors here:
//! they are reported inside [`ExecutionResult`](crate::ExecutionResult).

use thiserror::Error;

/// Main error type for snipbox operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to initialize {language} runtime: {message}")]
    Initialization { language: String, message: String },

    #[error("{0} runtime is not initialized")]
    NotInitialized(String),

    #[error("{0} runtime is busy with another execution")]
    Busy(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn init(language: &str, message: impl ToString) -> Self {
        Self::Initialization {
            language: language.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for snipbox operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for runtime probing operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("runtime not found: {runtime}\n  searched:\n{searched}")]
    NotFound { runtime: String, searched: String },

    #[error("probe script failed: {0}")]
    ProbeScriptFailed(String),

    #[error("failed to parse probe output: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
