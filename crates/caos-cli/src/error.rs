//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine error
    #[error("{0}")]
    Caos(#[from] caos::CaosError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary built without a browser backend
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// One or more runs found problems
    #[error("{failed} of {total} run(s) found problems")]
    Findings {
        /// Failed runs
        failed: usize,
        /// All runs
        total: usize,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
