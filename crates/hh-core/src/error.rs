use hh_repo::RepoError;
use hh_store::StoreError;
use hh_types::{EntityKind, TypeError};
use serde::Serialize;

/// One name that a bulk removal could not remove.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemovalFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of a best-effort bulk removal.
///
/// A report with at least one removed id is a success; callers must treat
/// `failed` as detail, not as an all-or-nothing rollback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failed: Vec<RemovalFailure>,
}

impl RemovalReport {
    pub fn record_removed(&mut self, id: impl Into<String>) {
        self.removed.push(id.into());
    }

    pub fn record_failed(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(RemovalFailure {
            name: name.into(),
            reason: reason.into(),
        });
    }

    /// Whether every requested name was removed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors surfaced by every core operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed or missing input, rejected before any write.
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A referenced id or name does not resolve.
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// A uniqueness rule was violated within `scope`.
    #[error("{kind} {name:?} already exists in {scope}")]
    Conflict {
        kind: EntityKind,
        name: String,
        scope: String,
    },

    /// The blob was rejected by policy or by the blob store.
    #[error("upload rejected: {0}")]
    Upload(String),

    /// A bulk cascade removed nothing.
    #[error("cascade removed nothing ({} failures)", .0.failed.len())]
    CascadeFailure(RemovalReport),

    /// The document store, blob store, or identity service is unusable.
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// The caller could not be authenticated or an author could not be resolved.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn conflict(kind: EntityKind, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Upload(_) => "upload",
            Self::CascadeFailure(_) => "cascade_failure",
            Self::Dependency(_) => "dependency",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected { .. } | StoreError::InvalidKey(_) => Self::Upload(e.to_string()),
            other => Self::Dependency(other.to_string()),
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound { kind, key } => Self::NotFound { kind, key },
            RepoError::InvalidField { field, reason } => Self::Validation { field, reason },
            RepoError::Decode { .. } => Self::Dependency(e.to_string()),
            RepoError::Store(inner) => inner.into(),
        }
    }
}

impl From<TypeError> for CoreError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::UnknownSlot(slot) => Self::validation("slot", format!("unknown slot {slot:?}")),
            TypeError::SlotNotOwned { kind, slot } => {
                Self::validation("slot", format!("{kind} has no {slot} slot"))
            }
            TypeError::EmptyId => Self::validation("id", "must not be empty"),
        }
    }
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
