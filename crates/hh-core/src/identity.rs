//! Identity and roster lookups.
//!
//! Authentication and the user roster live in an external service. The core
//! only needs two questions answered: who is calling, and which account a
//! human-readable discord tag belongs to.

use std::collections::HashMap;

use async_trait::async_trait;
use hh_types::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub account_id: AccountId,
    #[serde(default)]
    pub organizer: bool,
}

impl Caller {
    pub fn participant(account_id: impl Into<String>) -> Self {
        Self {
            account_id: AccountId::from_raw(account_id),
            organizer: false,
        }
    }

    pub fn organizer(account_id: impl Into<String>) -> Self {
        Self {
            account_id: AccountId::from_raw(account_id),
            organizer: true,
        }
    }

    /// Fail with `Forbidden` unless the caller is an organizer.
    pub fn require_organizer(&self) -> CoreResult<()> {
        if self.organizer {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "{} is not an organizer",
                self.account_id
            )))
        }
    }
}

/// External identity / roster service.
///
/// Implementations report every failure as [`CoreError::Unauthorized`];
/// identity problems are never data-integrity errors.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolve a session token to the calling account.
    async fn authenticate(&self, token: &str) -> CoreResult<Caller>;

    /// Resolve a discord tag to its stable account id.
    async fn resolve_tag(&self, tag: &str) -> CoreResult<Option<AccountId>>;
}

/// Fixed in-process identity table, for tests and local runs.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityService {
    sessions: HashMap<String, Caller>,
    tags: HashMap<String, AccountId>,
}

impl StaticIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as a session for `caller`.
    pub fn with_session(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.sessions.insert(token.into(), caller);
        self
    }

    /// Map a discord tag to an account.
    pub fn with_tag(mut self, tag: impl Into<String>, account: impl Into<String>) -> Self {
        self.tags.insert(tag.into(), AccountId::from_raw(account));
        self
    }
}

#[async_trait]
impl IdentityService for StaticIdentityService {
    async fn authenticate(&self, token: &str) -> CoreResult<Caller> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or_else(|| CoreError::Unauthorized("unknown session".into()))
    }

    async fn resolve_tag(&self, tag: &str) -> CoreResult<Option<AccountId>> {
        Ok(self.tags.get(tag).cloned())
    }
}
