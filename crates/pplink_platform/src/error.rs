//! Error types for platform operations.

use thiserror::Error;

use pplink_config::ConfigError;
use pplink_core::CoreError;

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors raised by the link flow and the platform clients.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The remote side answered, but not with what we needed.
    #[error("Unexpected response for {resource}: {reason}")]
    InvalidResponse { resource: String, reason: String },

    /// The environment is linked to a different policy than the one configured.
    #[error("Environment {environment} is already linked to {linked}; unlink it first")]
    LinkedElsewhere { environment: String, linked: String },
}

impl PlatformError {
    /// Whether this error means the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::Core(e) if e.is_not_found())
    }
}
