//! Blob key construction and validation.
//!
//! Keys have the shape
//! `<entity-kind>/<entity-id>/<slot>-<unix-millis>-<digest>.<ext>`. The
//! digest covers the content plus a UUID v7 nonce, so two uploads never
//! share a key even when the bytes and the millisecond coincide.

use chrono::{DateTime, Utc};
use hh_types::{AssetSlot, EntityKind};

use crate::error::{StoreError, StoreResult};

/// Longest key accepted by [`validate_key`].
pub const MAX_KEY_LEN: usize = 512;

/// Lower-cased extension of `file_name` (text after the last `.`), if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Build a fresh, unique key for an asset upload.
pub fn asset_key(
    kind: EntityKind,
    owner_id: &str,
    slot: AssetSlot,
    extension: &str,
    content: &[u8],
    now: DateTime<Utc>,
) -> String {
    let nonce = uuid::Uuid::now_v7();
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"hackhub-asset-v1:");
    hasher.update(nonce.as_bytes());
    hasher.update(content);
    let digest = hasher.finalize();
    let owner: String = owner_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "{kind}/{owner}/{slot}-{millis}-{digest}.{extension}",
        millis = now.timestamp_millis(),
        digest = hex::encode(&digest.as_bytes()[..8]),
    )
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

/// Validate that a key is non-empty and path-safe.
///
/// Valid keys:
/// - contain only ASCII alphanumerics, `-`, `_`, `.`, `/`
/// - do not start or end with `/`, and have no empty segments
/// - have no `.` or `..` segments
pub fn validate_key(key: &str) -> StoreResult<()> {
    let reject = |reason: &str| Err(StoreError::InvalidKey(format!("{key:?}: {reason}")));
    if key.is_empty() {
        return reject("key must not be empty");
    }
    if key.len() > MAX_KEY_LEN {
        return reject("key too long");
    }
    if let Some(c) = key.chars().find(|c| !is_key_char(*c)) {
        return reject(&format!("forbidden character {c:?}"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return reject("empty path segment"),
            "." | ".." => return reject("relative path segment"),
            _ => {}
        }
    }
    Ok(())
}
