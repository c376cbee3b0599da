//! Asset lifecycle manager.
//!
//! The only sanctioned way to change an asset-bearing field. Writes follow
//! one order: put the new blob, swap the key on the document with a
//! compare-and-set on the previous key, then delete the superseded blob.
//! A failed swap deletes the new blob, so the document never points at a
//! missing blob and no blob outlives its key.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use hh_store::{asset_key, file_extension, BlobStore, Collection, DocumentStore, Filter, Update};
use hh_types::{
    AssetOwner, AssetSlot, Bucket, ChallengeId, EntityKind, EventId, SubmissionId, TypeError,
};
use serde_json::Value;

use crate::config::AssetPolicy;
use crate::error::{CoreError, CoreResult};
use crate::schema::Upload;

/// The entity whose asset slot is being changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetTarget {
    Event(EventId),
    Challenge(ChallengeId),
    Submission(SubmissionId),
}

impl AssetTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Event(_) => EntityKind::Event,
            Self::Challenge(_) => EntityKind::Challenge,
            Self::Submission(_) => EntityKind::Submission,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Event(id) => id.as_str(),
            Self::Challenge(id) => id.as_str(),
            Self::Submission(id) => id.as_str(),
        }
    }

    fn collection(&self) -> Collection {
        match self {
            Self::Event(_) => Collection::Events,
            Self::Challenge(_) => Collection::Challenges,
            Self::Submission(_) => Collection::Submissions,
        }
    }

    fn bucket(&self) -> Bucket {
        match self {
            Self::Event(_) | Self::Challenge(_) => Bucket::PublicAssets,
            Self::Submission(_) => Bucket::SubmissionAssets,
        }
    }

    fn ensure_owns(&self, slot: AssetSlot) -> CoreResult<()> {
        if self.kind().owns(slot) {
            Ok(())
        } else {
            Err(TypeError::SlotNotOwned {
                kind: self.kind().to_string(),
                slot: slot.to_string(),
            }
            .into())
        }
    }
}

impl fmt::Display for AssetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id())
    }
}

/// Coordinates blob writes with the asset keys stored on documents.
#[derive(Clone)]
pub struct AssetManager {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    policy: AssetPolicy,
}

impl AssetManager {
    pub fn new(docs: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>, policy: AssetPolicy) -> Self {
        Self {
            docs,
            blobs,
            policy,
        }
    }

    pub fn policy(&self) -> &AssetPolicy {
        &self.policy
    }

    /// Check an upload against the policy for `slot`; returns its extension.
    pub fn check_upload(&self, slot: AssetSlot, upload: &Upload) -> CoreResult<String> {
        if upload.is_empty() {
            return Err(CoreError::Upload("empty payload".into()));
        }
        if upload.len() as u64 > self.policy.max_bytes {
            return Err(CoreError::Upload(format!(
                "{} bytes exceeds the {} byte limit",
                upload.len(),
                self.policy.max_bytes
            )));
        }
        let extension = file_extension(&upload.file_name).ok_or_else(|| {
            CoreError::Upload(format!("{:?} has no file extension", upload.file_name))
        })?;
        if !self.policy.allows(slot.kind(), &extension) {
            return Err(CoreError::Upload(format!(
                ".{extension} is not accepted for {slot} (allowed: {})",
                self.policy.extensions(slot.kind()).join(", ")
            )));
        }
        Ok(extension)
    }

    /// Store `upload` in `slot`, replacing and deleting any previous blob.
    ///
    /// On any failure the entity keeps its prior key and no new blob remains.
    pub async fn set_asset(
        &self,
        target: &AssetTarget,
        slot: AssetSlot,
        upload: Upload,
    ) -> CoreResult<String> {
        target.ensure_owns(slot)?;
        let extension = self.check_upload(slot, &upload)?;
        let previous = self.current_key(target, slot).await?;
        let bucket = target.bucket();

        let key = asset_key(
            target.kind(),
            target.id(),
            slot,
            &extension,
            &upload.bytes,
            Utc::now(),
        );
        let location = self.blobs.put(bucket, &key, upload.bytes).await?;
        tracing::debug!(%target, %slot, %location, size = location.size, "asset blob written");

        let expected = match &previous {
            Some(old) => Value::from(old.as_str()),
            None => Value::Null,
        };
        let filter = Filter::id(target.id()).eq(slot.field(), expected);
        let swapped = self
            .docs
            .update_one(
                target.collection(),
                &filter,
                &Update::new().set(slot.field(), key.as_str()),
            )
            .await;

        let failure = match swapped {
            Ok(outcome) if outcome.is_matched() => None,
            Ok(_) => Some(self.lost_race(target, slot).await),
            Err(e) => Some(e.into()),
        };
        if let Some(err) = failure {
            self.discard(bucket, &key).await;
            return Err(err);
        }

        if let Some(old) = previous.filter(|old| old != &key) {
            if let Err(e) = self.blobs.delete(bucket, &old).await {
                tracing::error!(%target, %slot, bucket = %bucket, key = %old, error = %e,
                    "superseded asset blob could not be deleted");
            }
        }
        tracing::info!(%target, %slot, key = %key, "asset set");
        Ok(key)
    }

    /// Clear `slot` and delete its blob. Clearing an empty slot is a no-op.
    ///
    /// Returns the key that was removed, if any.
    pub async fn clear_asset(
        &self,
        target: &AssetTarget,
        slot: AssetSlot,
    ) -> CoreResult<Option<String>> {
        target.ensure_owns(slot)?;
        let Some(previous) = self.current_key(target, slot).await? else {
            tracing::debug!(%target, %slot, "asset slot already empty");
            return Ok(None);
        };

        let filter = Filter::id(target.id()).eq(slot.field(), previous.as_str());
        let outcome = self
            .docs
            .update_one(target.collection(), &filter, &Update::new().unset(slot.field()))
            .await?;
        if !outcome.is_matched() {
            // The slot changed underneath us; the winning write owns the old blob.
            if !self.target_exists(target).await? {
                return Err(CoreError::not_found(target.kind(), target.id()));
            }
            tracing::warn!(%target, %slot, "asset changed concurrently, nothing cleared");
            return Ok(None);
        }

        self.blobs.delete(target.bucket(), &previous).await?;
        tracing::info!(%target, %slot, key = %previous, "asset cleared");
        Ok(Some(previous))
    }

    /// Read the blob currently stored in `slot`.
    pub async fn get_asset(&self, target: &AssetTarget, slot: AssetSlot) -> CoreResult<(String, Bytes)> {
        target.ensure_owns(slot)?;
        let key = self
            .current_key(target, slot)
            .await?
            .ok_or_else(|| CoreError::not_found(target.kind(), format!("{}/{slot}", target.id())))?;
        let bytes = self
            .blobs
            .get(target.bucket(), &key)
            .await?
            .ok_or_else(|| CoreError::not_found(target.kind(), format!("{}/{slot}", target.id())))?;
        Ok((key, bytes))
    }

    /// Delete every blob `owner` references. Used after the owning document
    /// has been deleted; keys are not touched.
    ///
    /// Every key is attempted; the first failure is reported afterwards.
    pub async fn purge<T: AssetOwner + Sync>(&self, owner: &T) -> CoreResult<usize> {
        let Some(bucket) = T::KIND.bucket() else {
            return Ok(0);
        };
        let mut deleted = 0;
        let mut first_error = None;
        for (slot, key) in owner.asset_keys() {
            match self.blobs.delete(bucket, &key).await {
                Ok(true) => deleted += 1,
                Ok(false) => tracing::warn!(kind = %T::KIND, id = owner.owner_id(), %slot, key = %key,
                    "owned blob was already gone"),
                Err(e) => {
                    tracing::error!(kind = %T::KIND, id = owner.owner_id(), %slot, key = %key, error = %e,
                        "owned blob could not be deleted");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => {
                tracing::debug!(kind = %T::KIND, id = owner.owner_id(), deleted, "owned blobs purged");
                Ok(deleted)
            }
        }
    }

    async fn current_key(&self, target: &AssetTarget, slot: AssetSlot) -> CoreResult<Option<String>> {
        let doc = self
            .docs
            .find_one(target.collection(), &Filter::id(target.id()))
            .await?
            .ok_or_else(|| CoreError::not_found(target.kind(), target.id()))?;
        Ok(doc
            .get(slot.field())
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn target_exists(&self, target: &AssetTarget) -> CoreResult<bool> {
        Ok(self
            .docs
            .find_one(target.collection(), &Filter::id(target.id()))
            .await?
            .is_some())
    }

    async fn lost_race(&self, target: &AssetTarget, slot: AssetSlot) -> CoreError {
        match self.target_exists(target).await {
            Ok(false) => CoreError::not_found(target.kind(), target.id()),
            Ok(true) => CoreError::conflict(
                target.kind(),
                slot.field(),
                format!("{target} (changed concurrently)"),
            ),
            Err(e) => e,
        }
    }

    async fn discard(&self, bucket: Bucket, key: &str) {
        match self.blobs.delete(bucket, key).await {
            Ok(_) => tracing::warn!(%bucket, key, "discarded unreferenced asset blob"),
            Err(e) => tracing::error!(%bucket, key, error = %e, "failed to discard asset blob"),
        }
    }
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
