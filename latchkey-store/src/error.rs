//! Error types for the storage layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched the lookup.
    #[error("license not found: {0}")]
    NotFound(String),

    /// The partial unique index rejected a second live license for an email.
    #[error("active license already exists for this email")]
    DuplicateActiveLicense,

    /// The primary key rejected a duplicate license key.
    #[error("license key already exists")]
    KeyCollision,

    /// The record changed between load and write; reload and retry.
    #[error("version conflict for license {0}")]
    VersionConflict(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value failed to parse back into its domain type.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}
