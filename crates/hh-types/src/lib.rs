//! Foundation types for hackhub.
//!
//! This crate provides the identifiers, persisted entity records, and asset
//! slot vocabulary shared by every other hackhub crate.
//!
//! # Key Types
//!
//! - [`EventId`], [`ChallengeId`], [`AccoladeId`], [`SubmissionId`] -- opaque,
//!   time-ordered identifiers (UUID v7 text)
//! - [`Event`], [`Challenge`], [`Accolade`], [`Submission`] -- top-level records
//! - [`Like`], [`Comment`], [`UserSubmissionLink`] -- join/annotation records
//! - [`AssetSlot`] / [`Bucket`] -- where an entity's binary assets live

pub mod asset;
pub mod entity;
pub mod error;
pub mod ids;

pub use asset::{AssetKind, AssetSlot, Bucket, EntityKind};
pub use entity::{
    Accolade, AssetOwner, Challenge, Comment, Event, Like, Submission, UserSubmissionLink,
};
pub use error::TypeError;
pub use ids::{
    AccoladeId, AccountId, ChallengeId, CommentId, EventId, LikeId, SubmissionId, UserLinkId,
};
