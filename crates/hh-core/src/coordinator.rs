//! Relationship coordinator.
//!
//! Every mutation that touches a parent/child pair goes through one method
//! here. Ordering rules:
//!
//! 1. A reference is added only after the referenced document exists.
//! 2. A reference is removed before the referenced document is deleted.
//! 3. Each multi-document write runs in a [`Saga`]; a failing step unwinds
//!    the steps before it.
//!
//! Bulk removals are best-effort per name and report what happened in a
//! [`RemovalReport`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use hh_repo::{fields, Entity, Repositories};
use hh_store::{BlobStore, DocumentStore, Update};
use hh_types::{
    Accolade, AccoladeId, Challenge, ChallengeId, EntityKind, Event, EventId, SubmissionId,
};
use serde::Serialize;
use serde_json::Value;

use crate::assets::AssetManager;
use crate::config::Limits;
use crate::error::{CoreError, CoreResult, RemovalFailure, RemovalReport};
use crate::saga::{Compensation, Saga};
use crate::schema::{
    check_window, AccoladeDraft, AccoladePatch, ChallengeDraft, ChallengePatch, EventDraft,
    EventPatch, ScopeChange,
};

/// What an event removal cascaded to.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRemoval {
    pub event_id: EventId,
    pub challenges: Vec<ChallengeId>,
    pub accolades: Vec<AccoladeId>,
    pub unlinked_submissions: Vec<SubmissionId>,
    /// Cascade steps that failed after the event itself was removed.
    pub failed: Vec<RemovalFailure>,
}

impl EventRemoval {
    fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            challenges: Vec::new(),
            accolades: Vec::new(),
            unlinked_submissions: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record_failed(&mut self, name: impl Into<String>, error: &CoreError) {
        self.failed.push(RemovalFailure {
            name: name.into(),
            reason: error.to_string(),
        });
    }
}

fn timestamp(t: DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Keeps parent/child reference sets consistent.
#[derive(Clone)]
pub struct Coordinator {
    repos: Repositories,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    assets: AssetManager,
    limits: Limits,
}

impl Coordinator {
    pub fn new(
        repos: Repositories,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        assets: AssetManager,
        limits: Limits,
    ) -> Self {
        Self {
            repos,
            docs,
            blobs,
            assets,
            limits,
        }
    }

    fn saga(&self, operation: &'static str) -> Saga {
        Saga::new(operation, Arc::clone(&self.docs), Arc::clone(&self.blobs))
    }

    // ---- Lookups ----

    async fn event(&self, name: &str) -> CoreResult<Event> {
        Ok(self.repos.events.require_by_name(name.trim()).await?)
    }

    async fn challenge_in(&self, event: &Event, name: &str) -> CoreResult<Challenge> {
        self.repos
            .challenges
            .by_name(&event.id, name.trim())
            .await?
            .ok_or_else(|| CoreError::not_found(EntityKind::Challenge, name.trim()))
    }

    /// Resolve an accolade name to one accolade. When the name exists in
    /// several scopes the event-wide one wins; several scoped matches with
    /// no event-wide one are ambiguous.
    async fn accolade_in(&self, event: &Event, name: &str) -> CoreResult<Accolade> {
        let name = name.trim();
        let mut matches = self.repos.accolades.by_name(&event.id, name).await?;
        if matches.len() > 1 {
            if let Some(pos) = matches.iter().position(|a| !a.is_scoped()) {
                return Ok(matches.swap_remove(pos));
            }
        }
        match matches.len() {
            0 => Err(CoreError::not_found(EntityKind::Accolade, name)),
            1 => Ok(matches.remove(0)),
            n => Err(CoreError::validation(
                "accolade",
                format!("{name:?} names {n} challenge-scoped accolades"),
            )),
        }
    }

    /// Resolve an accolade name within one challenge's scope.
    async fn accolade_scoped(
        &self,
        event: &Event,
        name: &str,
        challenge: &str,
    ) -> CoreResult<Accolade> {
        let challenge = self.challenge_in(event, challenge).await?;
        self.repos
            .accolades
            .in_scope(&event.id, name.trim(), Some(&challenge.id))
            .await?
            .ok_or_else(|| CoreError::not_found(EntityKind::Accolade, name.trim()))
    }

    fn scope_label(event: &Event, challenge: Option<&Challenge>) -> String {
        match challenge {
            Some(c) => format!("challenge {:?}", c.name),
            None => format!("event {:?}", event.name),
        }
    }

    // ---- Reference helpers ----

    /// Point an accolade's `challengeId` at `scope`, pulling the award from
    /// holders outside the new scope.
    async fn set_scope(
        &self,
        saga: &mut Saga,
        accolade: &Accolade,
        scope: Option<&ChallengeId>,
    ) -> CoreResult<()> {
        let update = Update::new().set_or_unset(fields::CHALLENGE_ID, scope);
        if !self.repos.accolades.update(&accolade.id, &update).await? {
            return Err(CoreError::not_found(EntityKind::Accolade, accolade.id.as_str()));
        }
        saga.record(Compensation::apply(
            Accolade::COLLECTION,
            accolade.id.as_str(),
            Update::new().set_or_unset(fields::CHALLENGE_ID, accolade.challenge_id.as_ref()),
        ));
        self.revoke_outside(saga, accolade, scope).await
    }

    /// A scoped accolade may only be held by submissions in its challenge.
    async fn revoke_outside(
        &self,
        saga: &mut Saga,
        accolade: &Accolade,
        scope: Option<&ChallengeId>,
    ) -> CoreResult<()> {
        let Some(scope) = scope else {
            return Ok(());
        };
        for holder in self.repos.submissions.with_accolade(&accolade.id).await? {
            if holder.challenge_id.as_ref() == Some(scope) {
                continue;
            }
            saga.unlink(
                &self.repos.submissions,
                &holder.id,
                fields::ACCOLADE_IDS,
                Value::from(&accolade.id),
            )
            .await?;
            tracing::info!(accolade_id = %accolade.id, submission_id = %holder.id,
                "award revoked, submission is outside the accolade's challenge");
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub async fn add_event(&self, draft: EventDraft) -> CoreResult<EventId> {
        let draft = draft.validate(&self.limits)?;
        if self.repos.events.by_name(&draft.name).await?.is_some() {
            return Err(CoreError::conflict(EntityKind::Event, draft.name, "catalog"));
        }
        let event = Event {
            id: EventId::new(),
            name: draft.name,
            description: draft.description,
            hidden: draft.hidden,
            start: draft.start,
            end: draft.end,
            image: None,
            challenge_ids: Vec::new(),
            accolade_ids: Vec::new(),
            submission_ids: Vec::new(),
        };
        self.repos.events.insert(&event).await?;
        tracing::info!(event_id = %event.id, name = %event.name, "event added");
        Ok(event.id)
    }

    pub async fn update_event(&self, name: &str, patch: EventPatch) -> CoreResult<EventId> {
        let patch = patch.validate(&self.limits)?;
        let event = self.event(name).await?;
        check_window(
            patch.start.unwrap_or(event.start),
            patch.end.unwrap_or(event.end),
        )?;

        let mut update = Update::new();
        if let Some(new_name) = &patch.name {
            if new_name != &event.name {
                if let Some(other) = self.repos.events.by_name(new_name).await? {
                    if other.id != event.id {
                        return Err(CoreError::conflict(EntityKind::Event, new_name, "catalog"));
                    }
                }
            }
            update = update.set(fields::NAME, new_name.as_str());
        }
        if let Some(description) = &patch.description {
            update = update.set(fields::DESCRIPTION, description.as_str());
        }
        if let Some(hidden) = patch.hidden {
            update = update.set(fields::HIDDEN, hidden);
        }
        if let Some(start) = patch.start {
            update = update.set(fields::START, timestamp(start));
        }
        if let Some(end) = patch.end {
            update = update.set(fields::END, timestamp(end));
        }
        self.repos.events.update_existing(&event.id, &update).await?;
        tracing::info!(event_id = %event.id, name = %event.name, "event updated");
        Ok(event.id)
    }

    /// Remove an event and cascade to everything that hangs off it.
    ///
    /// The event document goes first so the name stops resolving. Then
    /// submissions are unlinked (kept, with no event), accolades and
    /// challenges are deleted, and every owned blob is purged. Cascade steps
    /// that fail after the event is gone are reported in
    /// [`EventRemoval::failed`].
    pub async fn remove_event(&self, name: &str) -> CoreResult<EventRemoval> {
        let found = self.event(name).await?;
        let event = self
            .repos
            .events
            .delete(&found.id)
            .await?
            .ok_or_else(|| CoreError::not_found(EntityKind::Event, name.trim()))?;
        let mut removal = EventRemoval::new(event.id.clone());

        let accolades = self.repos.accolades.for_event(&event.id).await?;
        let accolade_ids: Vec<Value> = accolades.iter().map(|a| Value::from(&a.id)).collect();

        for submission in self.repos.submissions.for_event(&event.id).await? {
            let update = Update::new()
                .unset(fields::EVENT_ID)
                .unset(fields::CHALLENGE_ID)
                .unset(fields::ANSWERS)
                .pull_all(fields::ACCOLADE_IDS, accolade_ids.clone());
            match self.repos.submissions.update(&submission.id, &update).await {
                Ok(_) => removal.unlinked_submissions.push(submission.id),
                Err(e) => removal.record_failed(submission.name, &e.into()),
            }
        }

        for accolade in accolades {
            match self.repos.accolades.delete(&accolade.id).await {
                Ok(_) => removal.accolades.push(accolade.id),
                Err(e) => removal.record_failed(accolade.name, &e.into()),
            }
        }

        for challenge in self.repos.challenges.for_event(&event.id).await? {
            match self.repos.challenges.delete(&challenge.id).await {
                Ok(_) => {
                    if let Err(e) = self.assets.purge(&challenge).await {
                        removal.record_failed(challenge.name.as_str(), &e);
                    }
                    removal.challenges.push(challenge.id);
                }
                Err(e) => removal.record_failed(challenge.name, &e.into()),
            }
        }

        if let Err(e) = self.assets.purge(&event).await {
            removal.record_failed(event.name.as_str(), &e);
        }

        if removal.failed.is_empty() {
            tracing::info!(
                event_id = %event.id,
                name = %event.name,
                challenges = removal.challenges.len(),
                accolades = removal.accolades.len(),
                submissions = removal.unlinked_submissions.len(),
                "event removed"
            );
        } else {
            tracing::warn!(
                event_id = %event.id,
                name = %event.name,
                failures = removal.failed.len(),
                "event removed with incomplete cascade"
            );
        }
        Ok(removal)
    }

    // ---------------------------------------------------------------------
    // Challenges
    // ---------------------------------------------------------------------

    /// Create a challenge in `event_name` and scope the named accolades to it.
    pub async fn create_challenge(
        &self,
        event_name: &str,
        draft: ChallengeDraft,
    ) -> CoreResult<ChallengeId> {
        let draft = draft.validate(&self.limits)?;
        let event = self.event(event_name).await?;
        if self
            .repos
            .challenges
            .by_name(&event.id, &draft.title)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                EntityKind::Challenge,
                draft.title,
                Self::scope_label(&event, None),
            ));
        }
        let mut accolades = Vec::with_capacity(draft.accolade_names.len());
        for name in &draft.accolade_names {
            accolades.push(self.accolade_in(&event, name).await?);
        }

        let challenge = Challenge {
            id: ChallengeId::new(),
            name: draft.title,
            places: draft.places,
            questions: draft.questions,
            event_id: event.id.clone(),
            accolade_ids: accolades.iter().map(|a| a.id.clone()).collect(),
            image: None,
        };

        let mut saga = self.saga("create_challenge");
        let result = async {
            self.repos.challenges.insert(&challenge).await?;
            saga.record(Compensation::delete_document(
                Challenge::COLLECTION,
                challenge.id.as_str(),
            ));
            saga.link(
                &self.repos.events,
                &event.id,
                fields::CHALLENGE_IDS,
                Value::from(&challenge.id),
            )
            .await?;
            for accolade in &accolades {
                if let Some(old) = &accolade.challenge_id {
                    saga.unlink(
                        &self.repos.challenges,
                        old,
                        fields::ACCOLADE_IDS,
                        Value::from(&accolade.id),
                    )
                    .await?;
                }
                self.set_scope(&mut saga, accolade, Some(&challenge.id)).await?;
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        tracing::info!(
            event = %event.name,
            challenge_id = %challenge.id,
            name = %challenge.name,
            accolades = accolades.len(),
            "challenge created"
        );
        Ok(challenge.id)
    }

    pub async fn update_challenge(
        &self,
        event_name: &str,
        name: &str,
        patch: ChallengePatch,
    ) -> CoreResult<ChallengeId> {
        let patch = patch.validate(&self.limits)?;
        let event = self.event(event_name).await?;
        let challenge = self.challenge_in(&event, name).await?;

        let mut update = Update::new();
        if let Some(new_name) = &patch.name {
            if new_name != &challenge.name
                && self
                    .repos
                    .challenges
                    .by_name(&event.id, new_name)
                    .await?
                    .is_some()
            {
                return Err(CoreError::conflict(
                    EntityKind::Challenge,
                    new_name,
                    Self::scope_label(&event, None),
                ));
            }
            update = update.set(fields::NAME, new_name.as_str());
        }
        if let Some(questions) = patch.questions {
            update = update.set(fields::QUESTIONS, questions);
        }
        if let Some(places) = patch.places {
            update = update.set(fields::PLACES, places);
        }
        self.repos.challenges.update_existing(&challenge.id, &update).await?;
        tracing::info!(event = %event.name, challenge_id = %challenge.id, "challenge updated");
        Ok(challenge.id)
    }

    /// Remove challenges by name, best-effort per name.
    ///
    /// Fails with [`CoreError::CascadeFailure`] only when nothing was removed.
    pub async fn remove_challenges(
        &self,
        event_name: &str,
        names: &[String],
    ) -> CoreResult<RemovalReport> {
        let event = self.event(event_name).await?;
        let mut report = RemovalReport::default();
        let mut seen = HashSet::new();
        for name in names.iter().map(|n| n.trim()) {
            if !seen.insert(name) {
                continue;
            }
            let outcome = match self.repos.challenges.by_name(&event.id, name).await {
                Ok(Some(challenge)) => self.remove_challenge(&event, challenge).await,
                Ok(None) => Err(CoreError::not_found(EntityKind::Challenge, name)),
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok((id, purged)) => {
                    report.record_removed(id.into_inner());
                    if let Err(e) = purged {
                        report.record_failed(name, format!("challenge removed, assets not deleted: {e}"));
                    }
                }
                Err(e) => report.record_failed(name, e.to_string()),
            }
        }
        Self::finish_bulk("remove_challenges", &event, report)
    }

    /// Remove one challenge. The inner result is the blob purge, which runs
    /// after the document is gone and cannot be unwound.
    async fn remove_challenge(
        &self,
        event: &Event,
        challenge: Challenge,
    ) -> CoreResult<(ChallengeId, CoreResult<usize>)> {
        let scoped = self.repos.accolades.for_challenge(&challenge.id).await?;
        for accolade in &scoped {
            if self
                .repos
                .accolades
                .in_scope(&event.id, &accolade.name, None)
                .await?
                .is_some()
            {
                return Err(CoreError::conflict(
                    EntityKind::Accolade,
                    accolade.name.as_str(),
                    Self::scope_label(event, None),
                ));
            }
        }

        let mut saga = self.saga("remove_challenge");
        let result = async {
            saga.unlink(
                &self.repos.events,
                &event.id,
                fields::CHALLENGE_IDS,
                Value::from(&challenge.id),
            )
            .await?;
            for accolade in &scoped {
                self.set_scope(&mut saga, accolade, None).await?;
            }
            for submission in self.repos.submissions.for_challenge(&challenge.id).await? {
                let detach = Update::new()
                    .unset(fields::CHALLENGE_ID)
                    .unset(fields::ANSWERS);
                if self.repos.submissions.update(&submission.id, &detach).await? {
                    saga.record(Compensation::apply(
                        hh_types::Submission::COLLECTION,
                        submission.id.as_str(),
                        Update::new()
                            .set(fields::CHALLENGE_ID, &challenge.id)
                            .set(fields::ANSWERS, submission.answers),
                    ));
                }
            }
            if self.repos.challenges.delete(&challenge.id).await?.is_none() {
                return Err(CoreError::not_found(EntityKind::Challenge, challenge.name.as_str()));
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        let purged = self.assets.purge(&challenge).await;
        tracing::info!(event = %event.name, challenge_id = %challenge.id, name = %challenge.name,
            blobs_left = purged.is_err(), "challenge removed");
        Ok((challenge.id, purged))
    }

    fn finish_bulk(
        operation: &'static str,
        event: &Event,
        report: RemovalReport,
    ) -> CoreResult<RemovalReport> {
        if report.removed.is_empty() {
            tracing::warn!(operation, event = %event.name, failed = report.failed.len(),
                "bulk removal removed nothing");
            return Err(CoreError::CascadeFailure(report));
        }
        if report.is_complete() {
            tracing::info!(operation, event = %event.name, removed = report.removed.len(),
                "bulk removal complete");
        } else {
            tracing::warn!(operation, event = %event.name, removed = report.removed.len(),
                failed = report.failed.len(), "bulk removal partially applied");
        }
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Accolades
    // ---------------------------------------------------------------------

    /// Add an accolade. Names are unique per scope: event-wide names within
    /// the event, scoped names within their challenge.
    pub async fn add_accolade(
        &self,
        event_name: &str,
        draft: AccoladeDraft,
    ) -> CoreResult<AccoladeId> {
        let draft = draft.validate(&self.limits)?;
        let event = self.event(event_name).await?;
        let challenge = match &draft.challenge {
            Some(name) => Some(self.challenge_in(&event, name).await?),
            None => None,
        };
        let scope = challenge.as_ref().map(|c| &c.id);
        if self
            .repos
            .accolades
            .in_scope(&event.id, &draft.name, scope)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                EntityKind::Accolade,
                draft.name,
                Self::scope_label(&event, challenge.as_ref()),
            ));
        }

        let accolade = Accolade {
            id: AccoladeId::new(),
            name: draft.name,
            description: draft.description,
            emoji: draft.emoji,
            event_id: event.id.clone(),
            challenge_id: scope.cloned(),
        };

        let mut saga = self.saga("add_accolade");
        let result = async {
            self.repos.accolades.insert(&accolade).await?;
            saga.record(Compensation::delete_document(
                Accolade::COLLECTION,
                accolade.id.as_str(),
            ));
            saga.link(
                &self.repos.events,
                &event.id,
                fields::ACCOLADE_IDS,
                Value::from(&accolade.id),
            )
            .await?;
            if let Some(challenge) = &challenge {
                saga.link(
                    &self.repos.challenges,
                    &challenge.id,
                    fields::ACCOLADE_IDS,
                    Value::from(&accolade.id),
                )
                .await?;
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        tracing::info!(event = %event.name, accolade_id = %accolade.id, name = %accolade.name,
            scoped = accolade.is_scoped(), "accolade added");
        Ok(accolade.id)
    }

    /// Remove every accolade carrying each name, in any scope. With a
    /// `challenge` only the accolades scoped to that challenge go.
    pub async fn remove_accolades(
        &self,
        event_name: &str,
        names: &[String],
        challenge: Option<&str>,
    ) -> CoreResult<RemovalReport> {
        let event = self.event(event_name).await?;
        let scope = match challenge {
            Some(c) => Some(self.challenge_in(&event, c).await?.id),
            None => None,
        };
        let mut report = RemovalReport::default();
        let mut seen = HashSet::new();
        for name in names.iter().map(|n| n.trim()) {
            if !seen.insert(name) {
                continue;
            }
            let matches = match self.repos.accolades.by_name(&event.id, name).await {
                Ok(found) => found
                    .into_iter()
                    .filter(|a| scope.is_none() || a.challenge_id == scope)
                    .collect::<Vec<_>>(),
                Err(e) => {
                    report.record_failed(name, CoreError::from(e).to_string());
                    continue;
                }
            };
            if matches.is_empty() {
                report.record_failed(name, CoreError::not_found(EntityKind::Accolade, name).to_string());
            }
            for accolade in matches {
                match self.remove_accolade(&event, &accolade).await {
                    Ok(()) => report.record_removed(accolade.id.into_inner()),
                    Err(e) => report.record_failed(name, e.to_string()),
                }
            }
        }
        Self::finish_bulk("remove_accolades", &event, report)
    }

    async fn remove_accolade(&self, event: &Event, accolade: &Accolade) -> CoreResult<()> {
        let id = Value::from(&accolade.id);
        let mut saga = self.saga("remove_accolade");
        let result = async {
            if let Some(challenge_id) = &accolade.challenge_id {
                saga.unlink(
                    &self.repos.challenges,
                    challenge_id,
                    fields::ACCOLADE_IDS,
                    id.clone(),
                )
                .await?;
            }
            saga.unlink(
                &self.repos.events,
                &event.id,
                fields::ACCOLADE_IDS,
                id.clone(),
            )
            .await?;
            for submission in self.repos.submissions.with_accolade(&accolade.id).await? {
                saga.unlink(
                    &self.repos.submissions,
                    &submission.id,
                    fields::ACCOLADE_IDS,
                    id.clone(),
                )
                .await?;
            }
            if self.repos.accolades.delete(&accolade.id).await?.is_none() {
                return Err(CoreError::not_found(EntityKind::Accolade, accolade.name.as_str()));
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;
        tracing::info!(event = %event.name, accolade_id = %accolade.id, "accolade removed");
        Ok(())
    }

    /// Edit an accolade; `patch.challenge` re-scopes or clears the scope.
    pub async fn update_accolade(
        &self,
        event_name: &str,
        name: &str,
        patch: AccoladePatch,
    ) -> CoreResult<AccoladeId> {
        let patch = patch.validate(&self.limits)?;
        let event = self.event(event_name).await?;
        let accolade = match &patch.current_challenge {
            Some(current) => self.accolade_scoped(&event, name, current).await?,
            None => self.accolade_in(&event, name).await?,
        };

        let new_scope = match &patch.challenge {
            None => accolade.challenge_id.clone(),
            Some(ScopeChange::Clear) => None,
            Some(ScopeChange::Challenge(challenge)) => {
                Some(self.challenge_in(&event, challenge).await?.id)
            }
        };
        let new_name = patch.name.clone().unwrap_or_else(|| accolade.name.clone());
        let rescoped = new_scope != accolade.challenge_id;
        if new_name != accolade.name || rescoped {
            if let Some(other) = self
                .repos
                .accolades
                .in_scope(&event.id, &new_name, new_scope.as_ref())
                .await?
            {
                if other.id != accolade.id {
                    let scope = match &patch.challenge {
                        Some(ScopeChange::Challenge(c)) => format!("challenge {c:?}"),
                        _ => Self::scope_label(&event, None),
                    };
                    return Err(CoreError::conflict(EntityKind::Accolade, new_name, scope));
                }
            }
        }

        let mut update = Update::new();
        let mut revert = Update::new();
        if let Some(n) = &patch.name {
            update = update.set(fields::NAME, n.as_str());
            revert = revert.set(fields::NAME, accolade.name.as_str());
        }
        if let Some(d) = &patch.description {
            update = update.set(fields::DESCRIPTION, d.as_str());
            revert = revert.set(fields::DESCRIPTION, accolade.description.as_str());
        }
        if let Some(e) = &patch.emoji {
            update = update.set(fields::EMOJI, e.as_str());
            revert = revert.set(fields::EMOJI, accolade.emoji.as_str());
        }
        if rescoped {
            update = update.set_or_unset(fields::CHALLENGE_ID, new_scope.as_ref());
            revert = revert.set_or_unset(fields::CHALLENGE_ID, accolade.challenge_id.as_ref());
        }

        let id = Value::from(&accolade.id);
        let mut saga = self.saga("update_accolade");
        let result = async {
            if rescoped {
                if let Some(old) = &accolade.challenge_id {
                    saga.unlink(
                        &self.repos.challenges,
                        old,
                        fields::ACCOLADE_IDS,
                        id.clone(),
                    )
                    .await?;
                }
                if let Some(new) = &new_scope {
                    saga.link(
                        &self.repos.challenges,
                        new,
                        fields::ACCOLADE_IDS,
                        id.clone(),
                    )
                    .await?;
                }
                self.revoke_outside(&mut saga, &accolade, new_scope.as_ref())
                    .await?;
            }
            if !self.repos.accolades.update(&accolade.id, &update).await? {
                return Err(CoreError::not_found(EntityKind::Accolade, accolade.name.as_str()));
            }
            saga.record(Compensation::apply(
                Accolade::COLLECTION,
                accolade.id.as_str(),
                revert,
            ));
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        tracing::info!(event = %event.name, accolade_id = %accolade.id, rescoped, "accolade updated");
        Ok(accolade.id)
    }

    /// Award an accolade to a submission in the same event (and challenge,
    /// when the accolade is scoped).
    pub async fn award_accolade(
        &self,
        accolade_id: &AccoladeId,
        submission_id: &SubmissionId,
    ) -> CoreResult<()> {
        let accolade = self.repos.accolades.require(accolade_id).await?;
        let submission = self.repos.submissions.require(submission_id).await?;
        if submission.event_id.as_ref() != Some(&accolade.event_id) {
            return Err(CoreError::validation(
                "submission",
                "is not entered in the accolade's event",
            ));
        }
        if let Some(challenge_id) = &accolade.challenge_id {
            if submission.challenge_id.as_ref() != Some(challenge_id) {
                return Err(CoreError::validation(
                    "submission",
                    "is not entered in the accolade's challenge",
                ));
            }
        }
        if !self
            .repos
            .submissions
            .add_to_set(&submission.id, fields::ACCOLADE_IDS, &accolade.id)
            .await?
            .is_matched()
        {
            return Err(CoreError::not_found(EntityKind::Submission, submission_id.as_str()));
        }
        tracing::info!(accolade_id = %accolade.id, submission_id = %submission.id, "accolade awarded");
        Ok(())
    }

    /// Revoke an award. Returns `false` if it was not awarded.
    pub async fn revoke_accolade(
        &self,
        accolade_id: &AccoladeId,
        submission_id: &SubmissionId,
    ) -> CoreResult<bool> {
        let submission = self.repos.submissions.require(submission_id).await?;
        if !submission.accolade_ids.contains(accolade_id) {
            tracing::debug!(%accolade_id, %submission_id, "accolade not awarded, nothing to revoke");
            return Ok(false);
        }
        self.repos
            .submissions
            .pull(&submission.id, fields::ACCOLADE_IDS, accolade_id)
            .await?;
        tracing::info!(%accolade_id, %submission_id, "accolade revoked");
        Ok(true)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
