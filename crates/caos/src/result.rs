//! Result and error types for Caos.

use thiserror::Error;

/// Result type for Caos operations
pub type CaosResult<T> = Result<T, CaosError>;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum CaosError {
    /// Browser executable could not be launched
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// The page or browser handle is gone; nothing more can be done with it
    #[error("Page is closed: {message}")]
    PageClosed {
        /// Error message
        message: String,
    },

    /// A click landed on an element overlapping the intended target
    #[error("Click on {target} intercepted by {blocker}")]
    ClickIntercepted {
        /// Description of the intended target
        target: String,
        /// Description of the element that received the click
        blocker: String,
    },

    /// The element handle no longer refers to an element in the document
    #[error("Element {id} is detached from the document")]
    ElementDetached {
        /// Element identifier
        id: String,
    },

    /// A single interaction did not finish within the per-action timeout
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Low-level mouse, keyboard or element interaction failed
    #[error("Interaction failed: {message}")]
    InteractionError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Page reload did not reach an interactive state
    #[error("Reload failed: {message}")]
    ReloadError {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Page error channel could not be attached
    #[error("Error capture unavailable: {message}")]
    CaptureError {
        /// Error message
        message: String,
    },

    /// Run configuration rejected before the run started
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Run plan could not be parsed
    #[error("Invalid run plan: {message}")]
    PlanError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaosError {
    /// Create an interaction error
    #[must_use]
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::InteractionError {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error means the page handle can no longer be used
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::PageClosed { .. })
    }

    /// Whether the error is an overlay swallowing a click
    #[must_use]
    pub const fn is_intercepted(&self) -> bool {
        matches!(self, Self::ClickIntercepted { .. })
    }
}
