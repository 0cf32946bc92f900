//! Error types for the license core.

use thiserror::Error;

/// License lifecycle errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Key string does not match `XXXX-XXXX-XXXX-XXXX`.
    #[error("invalid license key format: {0}")]
    InvalidKeyFormat(String),

    /// No record matched the lookup.
    #[error("license not found")]
    NotFound,

    /// A live (active/trial) license already exists for the email.
    #[error("active license already exists for this email")]
    DuplicateActiveLicense,

    /// The requested transition is not allowed from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A generated key collided with an existing one; regenerate and retry.
    #[error("license key collision")]
    KeyCollision,

    /// Storage error surfaced by the caller's persistence layer.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
