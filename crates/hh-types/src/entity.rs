//! Persisted entity records.
//!
//! Each record maps 1:1 onto a document in its own collection. Field names
//! are camelCase on the wire and the identifier is stored as `_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{AssetSlot, EntityKind};
use crate::ids::{
    AccoladeId, AccountId, ChallengeId, CommentId, EventId, LikeId, SubmissionId, UserLinkId,
};

/// A hackathon event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Hidden events are only listed for organizers.
    #[serde(default)]
    pub hidden: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub challenge_ids: Vec<ChallengeId>,
    #[serde(default)]
    pub accolade_ids: Vec<AccoladeId>,
    #[serde(default)]
    pub submission_ids: Vec<SubmissionId>,
}

/// A challenge inside an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    #[serde(rename = "_id")]
    pub id: ChallengeId,
    pub name: String,
    pub places: u32,
    #[serde(default)]
    pub questions: Vec<String>,
    pub event_id: EventId,
    #[serde(default)]
    pub accolade_ids: Vec<AccoladeId>,
    #[serde(default)]
    pub image: Option<String>,
}

/// An award, either event-wide or scoped to one challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accolade {
    #[serde(rename = "_id")]
    pub id: AccoladeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub emoji: String,
    pub event_id: EventId,
    #[serde(default)]
    pub challenge_id: Option<ChallengeId>,
}

impl Accolade {
    pub fn is_scoped(&self) -> bool {
        self.challenge_id.is_some()
    }
}

/// A participant project entered into an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: SubmissionId,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub discord_tags: Vec<String>,
    /// `None` once the owning event has been removed.
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub challenge_id: Option<ChallengeId>,
    /// Answers to the challenge's questions, positionally.
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub source_code: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub photo0: Option<String>,
    #[serde(default)]
    pub photo1: Option<String>,
    #[serde(default)]
    pub photo2: Option<String>,
    #[serde(default)]
    pub accolade_ids: Vec<AccoladeId>,
    #[serde(default)]
    pub like_ids: Vec<LikeId>,
    #[serde(default)]
    pub comment_ids: Vec<CommentId>,
    pub submitted_at: DateTime<Utc>,
}

/// One user's like of a submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: LikeId,
    pub user_auth_id: AccountId,
    pub submission_id: SubmissionId,
}

/// A comment left on a submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    pub user_auth_id: AccountId,
    pub submission_id: SubmissionId,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

/// Authorship record linking an account to a submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSubmissionLink {
    #[serde(rename = "_id")]
    pub id: UserLinkId,
    pub user_auth_id: AccountId,
    pub submission_id: SubmissionId,
}

/// An entity that owns asset slots.
pub trait AssetOwner {
    const KIND: EntityKind;

    /// Document id as a string.
    fn owner_id(&self) -> &str;

    /// Key currently stored in `slot`, if any.
    fn asset_key(&self, slot: AssetSlot) -> Option<&str>;

    /// Every `(slot, key)` pair currently set.
    fn asset_keys(&self) -> Vec<(AssetSlot, String)> {
        Self::KIND
            .slots()
            .iter()
            .filter_map(|slot| self.asset_key(*slot).map(|k| (*slot, k.to_string())))
            .collect()
    }
}

impl AssetOwner for Event {
    const KIND: EntityKind = EntityKind::Event;

    fn owner_id(&self) -> &str {
        self.id.as_str()
    }

    fn asset_key(&self, slot: AssetSlot) -> Option<&str> {
        match slot {
            AssetSlot::Image => self.image.as_deref(),
            _ => None,
        }
    }
}

impl AssetOwner for Challenge {
    const KIND: EntityKind = EntityKind::Challenge;

    fn owner_id(&self) -> &str {
        self.id.as_str()
    }

    fn asset_key(&self, slot: AssetSlot) -> Option<&str> {
        match slot {
            AssetSlot::Image => self.image.as_deref(),
            _ => None,
        }
    }
}

impl AssetOwner for Submission {
    const KIND: EntityKind = EntityKind::Submission;

    fn owner_id(&self) -> &str {
        self.id.as_str()
    }

    fn asset_key(&self, slot: AssetSlot) -> Option<&str> {
        match slot {
            AssetSlot::Icon => self.icon.as_deref(),
            AssetSlot::SourceCode => self.source_code.as_deref(),
            AssetSlot::Markdown => self.markdown.as_deref(),
            AssetSlot::Photo0 => self.photo0.as_deref(),
            AssetSlot::Photo1 => self.photo1.as_deref(),
            AssetSlot::Photo2 => self.photo2.as_deref(),
            AssetSlot::Image => None,
        }
    }
}
