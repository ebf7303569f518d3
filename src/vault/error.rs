//! Error types for zone access operations.
//!
//! Only genuine failures are errors. A tap that matches nothing, a wrong
//! PIN, and an active lockout are expected decisions and are reported as
//! outcome values by the access controller instead.

use thiserror::Error;

/// Error type for zone access operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Malformed input (PIN format, coordinate, radius, empty content).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Zone or share token not found.
    #[error("Zone not found: {0}")]
    NotFound(String),

    /// The location is already covered by an existing zone.
    #[error("Zone already exists: {0}")]
    AlreadyExists(String),

    /// Owner-only action attempted by a non-owner. Nothing was mutated.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Storage collaborator failed. Propagated without retry.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Credential hashing failed. Fatal, not user-facing.
    #[error("Credential error: {0}")]
    Credential(String),
}

/// Result type alias for zone access operations.
pub type Result<T> = std::result::Result<T, VaultError>;

impl From<crate::credential::CredentialError> for VaultError {
    fn from(err: crate::credential::CredentialError) -> Self {
        use crate::credential::CredentialError;
        match err {
            CredentialError::Hash(msg) => Self::Credential(msg),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

impl From<crate::geo::GeoError> for VaultError {
    fn from(err: crate::geo::GeoError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
