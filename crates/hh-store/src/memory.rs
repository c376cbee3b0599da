use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use hh_types::Bucket;
use serde_json::Value;

use crate::document::{Collection, Filter, Update, UpdateOutcome, ID_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::key::validate_key;
use crate::traits::{BlobLocation, BlobStore, DocumentStore};

type Documents = HashMap<Collection, BTreeMap<String, Value>>;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".into())
}

// ---------------------------------------------------------------------------
// InMemoryDocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store.
///
/// Each collection is a `BTreeMap` keyed by `_id`, so iteration follows id
/// order (insertion order for UUID v7 ids). A single `RwLock` guards every
/// collection; no lock is held across an `.await`.
pub struct InMemoryDocumentStore {
    collections: RwLock<Documents>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, Documents>> {
        self.collections.read().map_err(poisoned)
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, Documents>> {
        self.collections.write().map_err(poisoned)
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.read_lock()
            .map(|map| map.get(&collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if no collection holds any document.
    pub fn is_empty(&self) -> bool {
        self.read_lock()
            .map(|map| map.values().all(BTreeMap::is_empty))
            .unwrap_or(true)
    }

    fn first_match<'a>(
        docs: &'a BTreeMap<String, Value>,
        filter: &Filter,
    ) -> Option<(&'a String, &'a Value)> {
        docs.iter().find(|(_, doc)| filter.matches(doc))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_one(&self, collection: Collection, doc: Value) -> StoreResult<String> {
        let Value::Object(mut map) = doc else {
            return Err(StoreError::InvalidDocument(
                "document must be a JSON object".into(),
            ));
        };
        let id = match map.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Null) | None => {
                let id = uuid::Uuid::now_v7().to_string();
                map.insert(ID_FIELD.into(), Value::String(id.clone()));
                id
            }
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "_id must be a non-empty string, found {other}"
                )))
            }
        };

        let mut collections = self.write_lock()?;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::DuplicateId { collection, id });
        }
        docs.insert(id.clone(), Value::Object(map));
        tracing::debug!(%collection, %id, "document inserted");
        Ok(id)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(&collection)
            .and_then(|docs| Self::first_match(docs, filter))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        update.validate()?;
        let mut collections = self.write_lock()?;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(id) = Self::first_match(docs, filter).map(|(id, _)| id.clone()) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(Value::Object(doc)) = docs.get_mut(&id) else {
            return Err(StoreError::InvalidDocument(format!(
                "stored document {id} is not an object"
            )));
        };
        let modified = update.apply(doc)?;
        tracing::debug!(%collection, %id, modified, "document updated");
        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<bool> {
        Ok(self.find_one_and_delete(collection, filter).await?.is_some())
    }

    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        let mut collections = self.write_lock()?;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        let Some(id) = Self::first_match(docs, filter).map(|(id, _)| id.clone()) else {
            return Ok(None);
        };
        tracing::debug!(%collection, %id, "document deleted");
        Ok(docs.remove(&id))
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&'static str, usize> = Collection::ALL
            .iter()
            .map(|c| (c.name(), self.len(*c)))
            .collect();
        f.debug_struct("InMemoryDocumentStore")
            .field("documents", &counts)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InMemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. An optional per-object size limit makes
/// the store reject oversized writes the way a real object store would.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<(Bucket, String), Bytes>>,
    max_object_size: Option<u64>,
}

impl InMemoryBlobStore {
    /// Create a new empty blob store with no size limit.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_object_size: None,
        }
    }

    /// Reject objects larger than `limit` bytes.
    pub fn with_max_object_size(mut self, limit: u64) -> Self {
        self.max_object_size = Some(limit);
        self
    }

    /// Number of blobs across both buckets.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Returns `true` if both buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys currently stored in `bucket`.
    pub fn keys(&self, bucket: Bucket) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .read()
            .map(|b| {
                b.keys()
                    .filter(|(bk, _)| *bk == bucket)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Whether `key` is present in `bucket`.
    pub fn contains(&self, bucket: Bucket, key: &str) -> bool {
        self.blobs
            .read()
            .map(|b| b.contains_key(&(bucket, key.to_string())))
            .unwrap_or(false)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> StoreResult<BlobLocation> {
        validate_key(key)?;
        let size = bytes.len() as u64;
        if let Some(limit) = self.max_object_size {
            if size > limit {
                return Err(StoreError::Rejected {
                    bucket,
                    reason: format!("object of {size} bytes exceeds limit of {limit}"),
                });
            }
        }
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        blobs.insert((bucket, key.to_string()), bytes);
        tracing::debug!(%bucket, key, size, "blob stored");
        Ok(BlobLocation {
            bucket,
            key: key.to_string(),
            size,
        })
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(&(bucket, key.to_string())).cloned())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        let existed = blobs.remove(&(bucket, key.to_string())).is_some();
        tracing::debug!(%bucket, key, existed, "blob deleted");
        Ok(existed)
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        Ok(self.contains(bucket, key))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .field("max_object_size", &self.max_object_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_and_find_by_id() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .insert_one(Collection::Events, json!({"_id": "e1", "name": "Hack1"}))
            .await
            .unwrap();
        assert_eq!(id, "e1");
        let doc = store
            .find_one(Collection::Events, &Filter::id("e1"))
            .await
            .unwrap()
            .expect("should exist");
        assert_eq!(doc["name"], "Hack1");
    }

    #[tokio::test]
    async fn insert_assigns_missing_id() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .insert_one(Collection::Likes, json!({"userAuthId": "u1"}))
            .await
            .unwrap();
        assert!(!id.is_empty());
        let doc = store
            .find_one(Collection::Likes, &Filter::id(id.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["_id"], id.as_str());
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(Collection::Events, json!({"_id": "e1"}))
            .await
            .unwrap();
        let err = store
            .insert_one(Collection::Events, json!({"_id": "e1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn non_object_rejected() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .insert_one(Collection::Events, json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(Collection::Events, json!({"_id": "x"}))
            .await
            .unwrap();
        assert!(store
            .find_one(Collection::Challenges, &Filter::id("x"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.len(Collection::Events), 1);
        assert_eq!(store.len(Collection::Challenges), 0);
    }

    #[tokio::test]
    async fn find_filters_and_orders_by_id() {
        let store = InMemoryDocumentStore::new();
        for (id, event) in [("c2", "e1"), ("c1", "e1"), ("c3", "e2")] {
            store
                .insert_one(Collection::Challenges, json!({"_id": id, "eventId": event}))
                .await
                .unwrap();
        }
        let docs = store
            .find(Collection::Challenges, &Filter::all().eq("eventId", "e1"))
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().filter_map(|d| d["_id"].as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(
            store
                .count(Collection::Challenges, &Filter::all())
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn update_one_reports_match_and_modification() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(Collection::Events, json!({"_id": "e1", "challengeIds": []}))
            .await
            .unwrap();
        let up = Update::new().add_to_set("challengeIds", "c1");
        let first = store
            .update_one(Collection::Events, &Filter::id("e1"), &up)
            .await
            .unwrap();
        assert_eq!(first, UpdateOutcome { matched: 1, modified: 1 });
        let second = store
            .update_one(Collection::Events, &Filter::id("e1"), &up)
            .await
            .unwrap();
        assert_eq!(second, UpdateOutcome { matched: 1, modified: 0 });
        let missing = store
            .update_one(Collection::Events, &Filter::id("nope"), &up)
            .await
            .unwrap();
        assert!(!missing.is_matched());
    }

    #[tokio::test]
    async fn delete_and_find_one_and_delete() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(Collection::Comments, json!({"_id": "m1", "message": "hi"}))
            .await
            .unwrap();
        let removed = store
            .find_one_and_delete(Collection::Comments, &Filter::id("m1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed["message"], "hi");
        assert!(!store
            .delete_one(Collection::Comments, &Filter::id("m1"))
            .await
            .unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn debug_lists_collections() {
        let store = InMemoryDocumentStore::default();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryDocumentStore"));
        assert!(debug.contains("events"));
    }

    // -----------------------------------------------------------------------
    // Concurrent set updates
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_to_set_keeps_every_member() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert_one(Collection::Events, json!({"_id": "e1"}))
            .await
            .unwrap();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update_one(
                            Collection::Events,
                            &Filter::id("e1"),
                            &Update::new().add_to_set("submissionIds", format!("s{i}")),
                        )
                        .await
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.expect("task should not panic");
        }

        let doc = store
            .find_one(Collection::Events, &Filter::id("e1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["submissionIds"].as_array().unwrap().len(), 32);
    }

    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_get_delete_blob() {
        let store = InMemoryBlobStore::new();
        let loc = store
            .put(Bucket::PublicAssets, "event/e1/image-1.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(loc.size, 3);
        assert_eq!(loc.to_string(), "public-assets/event/e1/image-1.png");
        assert_eq!(
            store
                .get(Bucket::PublicAssets, "event/e1/image-1.png")
                .await
                .unwrap()
                .unwrap(),
            Bytes::from_static(b"png")
        );
        assert!(store
            .delete(Bucket::PublicAssets, "event/e1/image-1.png")
            .await
            .unwrap());
        assert!(!store
            .delete(Bucket::PublicAssets, "event/e1/image-1.png")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let store = InMemoryBlobStore::new();
        store
            .put(Bucket::SubmissionAssets, "k", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(!store.exists(Bucket::PublicAssets, "k").await.unwrap());
        assert!(store.exists(Bucket::SubmissionAssets, "k").await.unwrap());
        assert_eq!(store.keys(Bucket::SubmissionAssets), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn oversized_blob_rejected() {
        let store = InMemoryBlobStore::new().with_max_object_size(4);
        let err = store
            .put(Bucket::SubmissionAssets, "big", Bytes::from_static(b"12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unsafe_key_rejected() {
        let store = InMemoryBlobStore::new();
        let err = store
            .put(Bucket::PublicAssets, "../etc/passwd", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
