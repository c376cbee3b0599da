//! Error types for repository operations.

use hh_store::StoreError;
use hh_types::EntityKind;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No entity of this kind with the given id or name.
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// A field value failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// A stored document could not be decoded into its record type.
    #[error("corrupt {kind} document {id}: {reason}")]
    Decode {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    /// The underlying document store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RepoError {
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
