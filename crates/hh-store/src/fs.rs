use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use hh_types::Bucket;

use crate::error::{StoreError, StoreResult};
use crate::key::validate_key;
use crate::traits::{BlobLocation, BlobStore};

/// Filesystem-backed blob store.
///
/// Layout: `<root>/<bucket-name>/<key>`. Writes go to a temporary sibling
/// file and are renamed into place, so readers never observe a partial blob.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for bucket in Bucket::ALL {
            tokio::fs::create_dir_all(root.join(bucket.name())).await?;
        }
        tracing::debug!(root = %root.display(), "filesystem blob store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: Bucket, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(bucket.name()).join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> StoreResult<BlobLocation> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::now_v7().simple()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(%bucket, key, size = bytes.len(), "blob written");
        Ok(BlobLocation {
            bucket,
            key: key.to_string(),
            size: bytes.len() as u64,
        })
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>> {
        let path = self.path_for(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        let path = self.path_for(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%bucket, key, "blob removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        let path = self.path_for(bucket, key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_bucket_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        assert!(store.root().join("public-assets").is_dir());
        assert!(store.root().join("submission-assets").is_dir());
    }

    #[tokio::test]
    async fn roundtrip_nested_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        let key = "submission/s1/icon-1-abcd.png";
        store
            .put(Bucket::SubmissionAssets, key, Bytes::from_static(b"icon"))
            .await
            .unwrap();
        assert!(dir
            .path()
            .join("submission-assets/submission/s1/icon-1-abcd.png")
            .is_file());
        let data = store.get(Bucket::SubmissionAssets, key).await.unwrap().unwrap();
        assert_eq!(&data[..], b"icon");
        assert!(store.exists(Bucket::SubmissionAssets, key).await.unwrap());
        assert!(!store.exists(Bucket::PublicAssets, key).await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store
            .put(Bucket::PublicAssets, "k.png", Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .put(Bucket::PublicAssets, "k.png", Bytes::from_static(b"two"))
            .await
            .unwrap();
        let data = store.get(Bucket::PublicAssets, "k.png").await.unwrap().unwrap();
        assert_eq!(&data[..], b"two");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store
            .put(Bucket::PublicAssets, "gone.png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(store.delete(Bucket::PublicAssets, "gone.png").await.unwrap());
        assert!(!store.delete(Bucket::PublicAssets, "gone.png").await.unwrap());
        assert!(store.get(Bucket::PublicAssets, "gone.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        let err = store
            .put(Bucket::PublicAssets, "../escape", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
