//! Application-level sagas for multi-document writes.
//!
//! The document store only guarantees atomicity per document. A core
//! operation that touches several documents records one [`Compensation`]
//! per completed step; if a later step fails the recorded compensations run
//! in reverse order, leaving no half-linked state behind.

use std::fmt;
use std::sync::Arc;

use hh_repo::{Entity, Repository};
use hh_store::{BlobStore, Collection, DocumentStore, Filter, Update};
use hh_types::Bucket;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Undo action for one completed step.
#[derive(Clone, Debug, PartialEq)]
pub enum Compensation {
    /// Delete a document this saga inserted.
    DeleteDocument { collection: Collection, id: String },
    /// Apply the inverse of an update this saga made.
    Apply {
        collection: Collection,
        id: String,
        update: Update,
    },
    /// Put back a document this saga deleted.
    InsertDocument { collection: Collection, doc: Value },
    /// Delete a blob this saga wrote.
    DeleteBlob { bucket: Bucket, key: String },
}

impl Compensation {
    pub fn delete_document(collection: Collection, id: impl Into<String>) -> Self {
        Self::DeleteDocument {
            collection,
            id: id.into(),
        }
    }

    pub fn apply(collection: Collection, id: impl Into<String>, update: Update) -> Self {
        Self::Apply {
            collection,
            id: id.into(),
            update,
        }
    }

    /// Snapshot `entity` so it can be re-inserted after a failed delete.
    pub fn restore<T: Entity>(entity: &T) -> CoreResult<Self> {
        let doc = serde_json::to_value(entity)
            .map_err(|e| CoreError::Dependency(format!("snapshot {}: {e}", T::KIND)))?;
        Ok(Self::InsertDocument {
            collection: T::COLLECTION,
            doc,
        })
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteDocument { collection, id } => write!(f, "delete {collection}/{id}"),
            Self::Apply { collection, id, .. } => write!(f, "revert {collection}/{id}"),
            Self::InsertDocument { collection, doc } => {
                let id = doc.get("_id").and_then(Value::as_str).unwrap_or("?");
                write!(f, "restore {collection}/{id}")
            }
            Self::DeleteBlob { bucket, key } => write!(f, "delete blob {bucket}/{key}"),
        }
    }
}

/// Compensation log for one core operation.
pub struct Saga {
    operation: &'static str,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    steps: Vec<Compensation>,
}

impl Saga {
    pub fn new(
        operation: &'static str,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            operation,
            docs,
            blobs,
            steps: Vec::new(),
        }
    }

    /// Record the undo action for a step that just succeeded.
    pub fn record(&mut self, compensation: Compensation) {
        self.steps.push(compensation);
    }

    /// `$addToSet` a child id into a parent set.
    ///
    /// The undo `$pull` is recorded only when the set actually changed, so an
    /// id that was already linked stays linked after an unwind.
    pub async fn link<T: Entity>(
        &mut self,
        repo: &Repository<T>,
        parent: &T::Id,
        field: &'static str,
        child: Value,
    ) -> CoreResult<()> {
        let outcome = repo.add_to_set(parent, field, child.clone()).await?;
        if !outcome.is_matched() {
            return Err(CoreError::not_found(T::KIND, parent.as_ref()));
        }
        if outcome.is_modified() {
            self.record(Compensation::apply(
                T::COLLECTION,
                parent.as_ref(),
                Update::new().pull(field, child),
            ));
        } else {
            tracing::debug!(operation = self.operation, kind = %T::KIND, parent = parent.as_ref(), field,
                "already linked");
        }
        Ok(())
    }

    /// `$pull` a child id from a parent set. A parent that no longer exists
    /// has nothing to unlink, and an id that was not in the set is not put
    /// back on unwind.
    pub async fn unlink<T: Entity>(
        &mut self,
        repo: &Repository<T>,
        parent: &T::Id,
        field: &'static str,
        child: Value,
    ) -> CoreResult<()> {
        let outcome = repo.pull(parent, field, child.clone()).await?;
        if outcome.is_modified() {
            self.record(Compensation::apply(
                T::COLLECTION,
                parent.as_ref(),
                Update::new().add_to_set(field, child),
            ));
        } else if outcome.is_matched() {
            tracing::debug!(operation = self.operation, kind = %T::KIND, parent = parent.as_ref(), field,
                "not linked");
        } else {
            tracing::warn!(operation = self.operation, kind = %T::KIND, parent = parent.as_ref(), field,
                "parent already gone");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Commit on `Ok`, compensate on `Err`; the result passes through.
    pub async fn finish<T>(self, result: CoreResult<T>) -> CoreResult<T> {
        match result {
            Ok(value) => {
                tracing::debug!(operation = self.operation, steps = self.steps.len(), "saga committed");
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation = self.operation, error = %e, "operation failed, compensating");
                self.compensate().await;
                Err(e)
            }
        }
    }

    /// Run every recorded compensation in reverse order.
    ///
    /// Compensation failures are logged and do not stop the unwind.
    /// Returns the number of compensations that failed.
    pub async fn compensate(self) -> usize {
        let mut failures = 0;
        for step in self.steps.into_iter().rev() {
            let outcome = match &step {
                Compensation::DeleteDocument { collection, id } => self
                    .docs
                    .delete_one(*collection, &Filter::id(id.as_str()))
                    .await
                    .map(|_| ()),
                Compensation::Apply {
                    collection,
                    id,
                    update,
                } => self
                    .docs
                    .update_one(*collection, &Filter::id(id.as_str()), update)
                    .await
                    .map(|_| ()),
                Compensation::InsertDocument { collection, doc } => {
                    match self.docs.insert_one(*collection, doc.clone()).await {
                        Err(hh_store::StoreError::DuplicateId { .. }) => Ok(()),
                        other => other.map(|_| ()),
                    }
                }
                Compensation::DeleteBlob { bucket, key } => {
                    self.blobs.delete(*bucket, key).await.map(|_| ())
                }
            };
            match outcome {
                Ok(()) => tracing::warn!(operation = self.operation, %step, "compensated"),
                Err(e) => {
                    failures += 1;
                    tracing::error!(operation = self.operation, %step, error = %e, "compensation failed");
                }
            }
        }
        failures
    }
}

impl fmt::Debug for Saga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Saga")
            .field("operation", &self.operation)
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use bytes::Bytes;
    use hh_store::{InMemoryBlobStore, InMemoryDocumentStore};
    use serde_json::json;

    fn stores() -> (Arc<InMemoryDocumentStore>, Arc<InMemoryBlobStore>) {
        (
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryBlobStore::new()),
        )
    }

    #[tokio::test]
    async fn failure_unwinds_in_reverse_order() {
        let (docs, blobs) = stores();
        let mut saga = Saga::new("test", docs.clone(), blobs.clone());

        docs.insert_one(Collection::Events, json!({"_id": "e1", "challengeIds": []}))
            .await
            .unwrap();
        docs.insert_one(Collection::Challenges, json!({"_id": "c1"}))
            .await
            .unwrap();
        saga.record(Compensation::delete_document(Collection::Challenges, "c1"));
        docs.update_one(
            Collection::Events,
            &Filter::id("e1"),
            &Update::new().add_to_set("challengeIds", "c1"),
        )
        .await
        .unwrap();
        saga.record(Compensation::apply(
            Collection::Events,
            "e1",
            Update::new().pull("challengeIds", "c1"),
        ));
        blobs
            .put(Bucket::PublicAssets, "k.png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        saga.record(Compensation::DeleteBlob {
            bucket: Bucket::PublicAssets,
            key: "k.png".into(),
        });
        assert_eq!(saga.len(), 3);

        let result: CoreResult<()> = Err(CoreError::Dependency("boom".into()));
        assert!(saga.finish(result).await.is_err());

        assert_eq!(docs.len(Collection::Challenges), 0);
        let event = docs
            .find_one(Collection::Events, &Filter::id("e1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event["challengeIds"], json!([]));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn success_keeps_every_step() {
        let (docs, blobs) = stores();
        let mut saga = Saga::new("test", docs.clone(), blobs.clone());
        docs.insert_one(Collection::Likes, json!({"_id": "l1"}))
            .await
            .unwrap();
        saga.record(Compensation::delete_document(Collection::Likes, "l1"));
        assert_eq!(saga.finish(Ok(7)).await.unwrap(), 7);
        assert_eq!(docs.len(Collection::Likes), 1);
    }

    #[tokio::test]
    async fn compensating_missing_targets_is_harmless() {
        let (docs, blobs) = stores();
        let mut saga = Saga::new("test", docs, blobs);
        saga.record(Compensation::delete_document(Collection::Comments, "gone"));
        saga.record(Compensation::DeleteBlob {
            bucket: Bucket::SubmissionAssets,
            key: "gone.md".into(),
        });
        assert_eq!(saga.compensate().await, 0);
    }

    #[tokio::test]
    async fn restore_reinserts_a_deleted_document() {
        use hh_types::{AccountId, Like, LikeId, SubmissionId};

        let (docs, blobs) = stores();
        let like = Like {
            id: LikeId::from_raw("l1"),
            user_auth_id: AccountId::from_raw("ada"),
            submission_id: SubmissionId::from_raw("s1"),
        };
        let snapshot = Compensation::restore(&like).unwrap();
        assert_eq!(snapshot.to_string(), "restore likes/l1");

        let mut saga = Saga::new("test", docs.clone(), blobs);
        saga.record(snapshot);
        assert_eq!(saga.compensate().await, 0);
        let doc = docs
            .find_one(Collection::Likes, &Filter::id("l1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["userAuthId"], "ada");
    }

    #[tokio::test]
    async fn unwinding_an_unlink_of_an_absent_child_adds_nothing() {
        use hh_repo::{fields, Repositories};
        use hh_types::ChallengeId;

        let (docs, blobs) = stores();
        let repos = Repositories::new(docs.clone());
        let mut event = crate::testing::sample_event("Hack1");
        event.challenge_ids = vec![ChallengeId::from_raw("c1")];
        repos.events.insert(&event).await.unwrap();

        let mut saga = Saga::new("test", docs.clone(), blobs);
        saga.unlink(&repos.events, &event.id, fields::CHALLENGE_IDS, json!("ghost"))
            .await
            .unwrap();
        saga.link(&repos.events, &event.id, fields::CHALLENGE_IDS, json!("c1"))
            .await
            .unwrap();
        assert!(saga.is_empty());

        saga.unlink(&repos.events, &event.id, fields::CHALLENGE_IDS, json!("c1"))
            .await
            .unwrap();
        assert_eq!(saga.len(), 1);

        let result: CoreResult<()> = Err(CoreError::Dependency("boom".into()));
        assert!(saga.finish(result).await.is_err());
        let event = repos.events.require(&event.id).await.unwrap();
        assert_eq!(event.challenge_ids, vec![ChallengeId::from_raw("c1")]);
    }
}
