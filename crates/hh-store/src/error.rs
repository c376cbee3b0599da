use hh_types::Bucket;

use crate::document::Collection;

/// Errors from document and blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A document with this `_id` already exists in the collection.
    #[error("duplicate id {id} in {collection}")]
    DuplicateId { collection: Collection, id: String },

    /// The document or update is structurally invalid.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The blob key is empty or not path-safe.
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// The blob store refused the object (size, type, quota).
    #[error("blob rejected by {bucket}: {reason}")]
    Rejected { bucket: Bucket, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend unreachable, timed out, or otherwise unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
