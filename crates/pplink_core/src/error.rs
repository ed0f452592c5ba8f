//! Error types for control-plane operations.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while talking to a control plane.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Credential acquisition failed. Never retried by callers.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource is already in the requested state (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A long-running operation exceeded its polling budget. The outcome is
    /// unknown; the operation may still complete server-side.
    #[error("Timed out waiting for {operation} after {attempts} polls")]
    Timeout { operation: String, attempts: u32 },

    /// The caller lacks rights (HTTP 403).
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Any other non-success response.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A required local tool or setting is missing.
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Confirmation failed: {0}")]
    Gate(String),

    #[error("Step '{step}' failed and stopped the run: {message}")]
    FatalStep { step: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Map a non-success HTTP status to the error taxonomy.
    pub fn from_status(status: u16, target: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => CoreError::Auth(format!("{} rejected the token: {}", target, body)),
            403 => CoreError::Permission(format!("{}: {}", target, body)),
            404 => CoreError::NotFound(target.to_string()),
            409 => CoreError::Conflict(format!("{}: {}", target, body)),
            _ => CoreError::Api { status, body },
        }
    }

    /// Whether this error means the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Transport(err.to_string())
    }
}
