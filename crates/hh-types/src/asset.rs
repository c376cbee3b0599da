use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The two logical buckets of the blob store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    /// Event and challenge artwork, served publicly.
    PublicAssets,
    /// Everything a participant uploads for a submission.
    SubmissionAssets,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::PublicAssets, Bucket::SubmissionAssets];

    /// Stable bucket name (also the directory name for filesystem backends).
    pub fn name(&self) -> &'static str {
        match self {
            Self::PublicAssets => "public-assets",
            Self::SubmissionAssets => "submission-assets",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of persisted entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Event,
    Challenge,
    Accolade,
    Submission,
    Like,
    Comment,
    UserSubmissionLink,
}

impl EntityKind {
    /// Asset slots an entity of this kind may own.
    pub fn slots(&self) -> &'static [AssetSlot] {
        match self {
            Self::Event | Self::Challenge => &[AssetSlot::Image],
            Self::Submission => &[
                AssetSlot::Icon,
                AssetSlot::SourceCode,
                AssetSlot::Markdown,
                AssetSlot::Photo0,
                AssetSlot::Photo1,
                AssetSlot::Photo2,
            ],
            _ => &[],
        }
    }

    /// Bucket holding this kind's assets, if it owns any.
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            Self::Event | Self::Challenge => Some(Bucket::PublicAssets),
            Self::Submission => Some(Bucket::SubmissionAssets),
            _ => None,
        }
    }

    /// Whether `slot` belongs to this kind.
    pub fn owns(&self, slot: AssetSlot) -> bool {
        self.slots().contains(&slot)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Challenge => "challenge",
            Self::Accolade => "accolade",
            Self::Submission => "submission",
            Self::Like => "like",
            Self::Comment => "comment",
            Self::UserSubmissionLink => "user-submission-link",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content category an asset slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Image,
    Archive,
    Markdown,
}

/// A named asset-bearing field on an entity document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetSlot {
    Image,
    Icon,
    SourceCode,
    Markdown,
    Photo0,
    Photo1,
    Photo2,
}

impl AssetSlot {
    pub const PHOTOS: [AssetSlot; 3] = [AssetSlot::Photo0, AssetSlot::Photo1, AssetSlot::Photo2];

    /// Document field name holding this slot's key.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Icon => "icon",
            Self::SourceCode => "sourceCode",
            Self::Markdown => "markdown",
            Self::Photo0 => "photo0",
            Self::Photo1 => "photo1",
            Self::Photo2 => "photo2",
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Image | Self::Icon | Self::Photo0 | Self::Photo1 | Self::Photo2 => {
                AssetKind::Image
            }
            Self::SourceCode => AssetKind::Archive,
            Self::Markdown => AssetKind::Markdown,
        }
    }

    /// Photo slot by index (0..3).
    pub fn photo(index: usize) -> Option<Self> {
        Self::PHOTOS.get(index).copied()
    }
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for AssetSlot {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "icon" => Ok(Self::Icon),
            "sourceCode" | "source-code" | "source_code" => Ok(Self::SourceCode),
            "markdown" => Ok(Self::Markdown),
            "photo0" => Ok(Self::Photo0),
            "photo1" => Ok(Self::Photo1),
            "photo2" => Ok(Self::Photo2),
            other => Err(TypeError::UnknownSlot(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_sets_per_kind() {
        assert_eq!(EntityKind::Event.slots(), &[AssetSlot::Image]);
        assert_eq!(EntityKind::Challenge.slots(), &[AssetSlot::Image]);
        assert_eq!(EntityKind::Submission.slots().len(), 6);
        assert!(EntityKind::Accolade.slots().is_empty());
        assert!(!EntityKind::Submission.owns(AssetSlot::Image));
        assert!(EntityKind::Submission.owns(AssetSlot::Photo2));
    }

    #[test]
    fn buckets_per_kind() {
        assert_eq!(EntityKind::Event.bucket(), Some(Bucket::PublicAssets));
        assert_eq!(EntityKind::Submission.bucket(), Some(Bucket::SubmissionAssets));
        assert_eq!(EntityKind::Like.bucket(), None);
    }

    #[test]
    fn slot_parse_and_field() {
        for slot in [
            AssetSlot::Image,
            AssetSlot::Icon,
            AssetSlot::SourceCode,
            AssetSlot::Markdown,
            AssetSlot::Photo0,
            AssetSlot::Photo1,
            AssetSlot::Photo2,
        ] {
            assert_eq!(slot.field().parse::<AssetSlot>().unwrap(), slot);
        }
        assert_eq!("source-code".parse::<AssetSlot>().unwrap(), AssetSlot::SourceCode);
        assert!(matches!(
            "banner".parse::<AssetSlot>(),
            Err(TypeError::UnknownSlot(_))
        ));
    }

    #[test]
    fn slot_kinds() {
        assert_eq!(AssetSlot::Photo1.kind(), AssetKind::Image);
        assert_eq!(AssetSlot::SourceCode.kind(), AssetKind::Archive);
        assert_eq!(AssetSlot::Markdown.kind(), AssetKind::Markdown);
    }

    #[test]
    fn photo_by_index() {
        assert_eq!(AssetSlot::photo(0), Some(AssetSlot::Photo0));
        assert_eq!(AssetSlot::photo(2), Some(AssetSlot::Photo2));
        assert_eq!(AssetSlot::photo(3), None);
    }

    #[test]
    fn bucket_names() {
        assert_eq!(Bucket::PublicAssets.to_string(), "public-assets");
        assert_eq!(Bucket::SubmissionAssets.name(), "submission-assets");
    }
}
