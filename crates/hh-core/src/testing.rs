//! Test doubles shared by the core test modules.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hh_store::{
    BlobLocation, BlobStore, Collection, DocumentStore, Filter, InMemoryBlobStore,
    InMemoryDocumentStore, StoreError, StoreResult, Update, UpdateOutcome,
};
use hh_types::{Bucket, Event, EventId, Submission, SubmissionId};
use serde_json::Value;

use crate::config::CoreConfig;
use crate::identity::{Caller, StaticIdentityService};
use crate::Hackhub;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Insert,
    Update,
    Delete,
}

/// Document store that fails chosen operations on chosen collections.
pub struct FlakyDocumentStore {
    inner: InMemoryDocumentStore,
    failing: Mutex<HashSet<(Op, Collection)>>,
}

impl FlakyDocumentStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    pub fn fail(&self, op: Op, collection: Collection) {
        self.failing.lock().unwrap().insert((op, collection));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, op: Op, collection: Collection) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(&(op, collection)) {
            Err(StoreError::Unavailable(format!("injected {op:?} failure on {collection}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn insert_one(&self, collection: Collection, doc: Value) -> StoreResult<String> {
        self.check(Op::Insert, collection)?;
        self.inner.insert_one(collection, doc).await
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>> {
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        self.inner.find(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        self.check(Op::Update, collection)?;
        self.inner.update_one(collection, filter, update).await
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<bool> {
        self.check(Op::Delete, collection)?;
        self.inner.delete_one(collection, filter).await
    }

    async fn find_one_and_delete(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Value>> {
        self.check(Op::Delete, collection)?;
        self.inner.find_one_and_delete(collection, filter).await
    }
}

/// Blob store whose deletes can be made to fail.
pub struct FlakyBlobStore {
    inner: InMemoryBlobStore,
    fail_deletes: Mutex<bool>,
}

impl FlakyBlobStore {
    pub fn new(inner: InMemoryBlobStore) -> Self {
        Self {
            inner,
            fail_deletes: Mutex::new(false),
        }
    }

    pub fn inner(&self) -> &InMemoryBlobStore {
        &self.inner
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> StoreResult<BlobLocation> {
        self.inner.put(bucket, key, bytes).await
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>> {
        self.inner.get(bucket, key).await
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        if *self.fail_deletes.lock().unwrap() {
            return Err(StoreError::Unavailable("injected delete failure".into()));
        }
        self.inner.delete(bucket, key).await
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

pub fn sample_event(name: &str) -> Event {
    Event {
        id: EventId::new(),
        name: name.into(),
        description: String::new(),
        hidden: false,
        start: t0(),
        end: t0() + Duration::days(1),
        image: None,
        challenge_ids: vec![],
        accolade_ids: vec![],
        submission_ids: vec![],
    }
}

pub fn sample_submission(name: &str, event_id: Option<&EventId>) -> Submission {
    Submission {
        id: SubmissionId::new(),
        name: name.into(),
        tags: vec![],
        links: vec![],
        discord_tags: vec!["ada#0001".into()],
        event_id: event_id.cloned(),
        challenge_id: None,
        answers: vec![],
        icon: None,
        source_code: None,
        markdown: None,
        photo0: None,
        photo1: None,
        photo2: None,
        accolade_ids: vec![],
        like_ids: vec![],
        comment_ids: vec![],
        submitted_at: t0(),
    }
}

/// A full service stack over flaky in-memory stores.
pub struct Harness {
    pub hub: Hackhub,
    pub docs: Arc<FlakyDocumentStore>,
    pub blobs: Arc<FlakyBlobStore>,
}

pub fn harness() -> Harness {
    let docs = Arc::new(FlakyDocumentStore::new(InMemoryDocumentStore::new()));
    let blobs = Arc::new(FlakyBlobStore::new(InMemoryBlobStore::new()));
    let identity = StaticIdentityService::new()
        .with_session("t-ada", ada())
        .with_session("t-bob", bob())
        .with_session("t-org", organizer())
        .with_tag("ada#0001", "ada")
        .with_tag("bob#0002", "bob")
        .with_tag("cy#0003", "cy");
    let hub = Hackhub::new(
        docs.clone(),
        blobs.clone(),
        Arc::new(identity),
        CoreConfig::default(),
    );
    Harness { hub, docs, blobs }
}

pub fn ada() -> Caller {
    Caller::participant("ada")
}

pub fn bob() -> Caller {
    Caller::participant("bob")
}

pub fn organizer() -> Caller {
    Caller::organizer("org")
}
