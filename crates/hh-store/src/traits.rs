use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use hh_types::Bucket;
use serde_json::Value;

use crate::document::{Collection, Filter, Update, UpdateOutcome};
use crate::error::StoreResult;

/// Document database adapter.
///
/// All implementations must satisfy these invariants:
/// - Each collection is keyed by the string `_id` field of its documents.
/// - `update_one` applies all of its operators to a single document
///   atomically; no call spans more than one document.
/// - Deleting a document that does not exist returns `false`, not an error.
/// - The adapter never interprets documents beyond `_id` and the filter and
///   update fields it is handed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return its `_id`.
    ///
    /// If the document has no `_id`, a UUID v7 is assigned. Inserting a
    /// duplicate `_id` fails with [`StoreError::DuplicateId`](crate::StoreError::DuplicateId).
    async fn insert_one(&self, collection: Collection, doc: Value) -> StoreResult<String>;

    /// First document matching `filter`, in `_id` order.
    async fn find_one(&self, collection: Collection, filter: &Filter)
        -> StoreResult<Option<Value>>;

    /// Every document matching `filter`, in `_id` order.
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>>;

    /// Apply `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    /// Delete the first document matching `filter`. Returns `true` if one existed.
    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<bool>;

    /// Delete the first document matching `filter` and return it.
    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>>;

    /// Number of documents matching `filter`.
    ///
    /// Default implementation counts the result of `find()`.
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        Ok(self.find(collection, filter).await?.len())
    }
}

/// Where a blob was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobLocation {
    pub bucket: Bucket,
    pub key: String,
    pub size: u64,
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Object storage adapter with two logical buckets.
///
/// - Keys are chosen by the caller and never reused for a different asset.
/// - `put` overwrites an existing key.
/// - `delete` is idempotent: deleting an absent key returns `Ok(false)`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob under `key`.
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> StoreResult<BlobLocation>;

    /// Read a blob. Returns `Ok(None)` if it does not exist.
    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>>;

    /// Delete a blob. Returns `true` if it existed.
    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<bool>;

    /// Check whether a blob exists.
    ///
    /// Default implementation reads the blob.
    async fn exists(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        Ok(self.get(bucket, key).await?.is_some())
    }
}
