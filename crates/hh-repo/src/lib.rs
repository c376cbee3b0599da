//! Typed entity repositories for hackhub.
//!
//! Each entity (event, challenge, accolade, submission, like, comment,
//! user-submission link) gets a [`Repository`] that converts between typed
//! records and documents in its collection. Repositories carry no business
//! rules: they never touch a second collection, and every cross-reference
//! change is made by the coordinator in `hh-core`.
//!
//! # Modules
//!
//! - [`error`] -- Error types for repository operations
//! - [`entity`] -- The [`Entity`] trait binding records to collections
//! - [`repository`] -- Generic [`Repository`] plus per-entity lookups
//! - [`names`] -- Field-level validation of names and free text
//! - [`fields`] -- Document field names used in filters and updates

pub mod entity;
pub mod error;
pub mod fields;
pub mod names;
pub mod repository;

pub use entity::Entity;
pub use error::{RepoError, Result};
pub use names::{validate_emoji, validate_name, validate_text};
pub use repository::{
    AccoladeRepo, ChallengeRepo, CommentRepo, EventRepo, LikeRepo, Repositories, Repository,
    SubmissionRepo, UserLinkRepo,
};
