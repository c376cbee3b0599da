//! Core services for hackhub.
//!
//! The core owns every rule that spans more than one document: reference
//! sets between events, challenges, accolades and submissions, the asset
//! lifecycle, and the read-side façade. Storage comes in through the
//! `hh-store` traits and identity through [`IdentityService`], all injected
//! at construction.
//!
//! # Modules
//!
//! - [`coordinator`] -- Events, challenges, accolades and their references
//! - [`submissions`] -- Submissions, authorship, likes and comments
//! - [`assets`] -- Upload, replace, clear and purge of entity blobs
//! - [`query`] -- Events and submissions with references embedded
//! - [`saga`] -- Compensation log for multi-document writes
//! - [`schema`] -- Typed drafts and patches, validated before any write
//! - [`identity`] -- Caller identity and discord tag resolution
//! - [`config`] -- Asset policy and field limits
//! - [`error`] -- Error taxonomy shared by every service

use std::sync::Arc;

use hh_repo::Repositories;
use hh_store::{BlobStore, DocumentStore};

pub mod assets;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod query;
pub mod saga;
pub mod schema;
pub mod submissions;

#[cfg(test)]
mod testing;

pub use assets::{AssetManager, AssetTarget};
pub use config::{AssetPolicy, CoreConfig, Limits};
pub use coordinator::{Coordinator, EventRemoval};
pub use error::{CoreError, CoreResult, RemovalFailure, RemovalReport};
pub use identity::{Caller, IdentityService, StaticIdentityService};
pub use query::{EventView, FullEvent, FullSubmission, QueryFacade};
pub use schema::{
    AccoladeDraft, AccoladePatch, ChallengeDraft, ChallengePatch, EventDraft, EventPatch,
    ScopeChange, SubmissionDraft, SubmissionPatch, Upload,
};
pub use submissions::{SubmissionRemoval, SubmissionService};

/// Every core service wired over one document store, one blob store and one
/// identity service.
#[derive(Clone)]
pub struct Hackhub {
    pub coordinator: Coordinator,
    pub submissions: SubmissionService,
    pub assets: AssetManager,
    pub query: QueryFacade,
    identity: Arc<dyn IdentityService>,
}

impl Hackhub {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityService>,
        config: CoreConfig,
    ) -> Self {
        let repos = Repositories::new(Arc::clone(&docs));
        let assets = AssetManager::new(Arc::clone(&docs), Arc::clone(&blobs), config.assets);
        Self {
            coordinator: Coordinator::new(
                repos.clone(),
                Arc::clone(&docs),
                Arc::clone(&blobs),
                assets.clone(),
                config.limits.clone(),
            ),
            submissions: SubmissionService::new(
                repos.clone(),
                docs,
                blobs,
                assets.clone(),
                Arc::clone(&identity),
                config.limits,
            ),
            assets,
            query: QueryFacade::new(repos),
            identity,
        }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }
}

impl std::fmt::Debug for Hackhub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hackhub")
            .field("coordinator", &self.coordinator)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
