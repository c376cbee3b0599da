//! Storage adapters for hackhub.
//!
//! Two leaf adapters live here, neither of which knows any business rule:
//!
//! - [`DocumentStore`] -- typed-agnostic CRUD over named collections of JSON
//!   documents, with the individually atomic set updates (`$set`, `$unset`,
//!   `$addToSet`, `$pull`, `$pullAll`) the coordinator relies on.
//! - [`BlobStore`] -- put/get/delete of named binary blobs in one of two
//!   logical buckets.
//!
//! # Backends
//!
//! - [`InMemoryDocumentStore`] -- `RwLock`-guarded maps, one per collection
//! - [`InMemoryBlobStore`] -- `HashMap`-based blob store for tests and embedding
//! - [`FsBlobStore`] -- one directory per bucket on the local filesystem
//!
//! # Design Rules
//!
//! 1. Every single-document update is atomic; nothing spans documents.
//! 2. Deleting an absent blob or document is not an error.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod document;
pub mod error;
pub mod fs;
pub mod key;
pub mod memory;
pub mod traits;

pub use document::{Collection, Filter, Update, UpdateOp, UpdateOutcome};
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use key::{asset_key, file_extension, validate_key};
pub use memory::{InMemoryBlobStore, InMemoryDocumentStore};
pub use traits::{BlobLocation, BlobStore, DocumentStore};
