//! Submission service: authorship, likes and comments.
//!
//! Follows the same ordering rules as the coordinator. Authors are resolved
//! from discord tags through the identity service before anything is
//! written.

use std::sync::Arc;

use chrono::Utc;
use hh_repo::{fields, Entity, Repositories};
use hh_store::{BlobStore, DocumentStore, Update};
use hh_types::{
    AccountId, Challenge, Comment, CommentId, EntityKind, Like, LikeId, Submission, SubmissionId,
    UserLinkId, UserSubmissionLink,
};
use serde::Serialize;
use serde_json::Value;

use crate::assets::AssetManager;
use crate::config::Limits;
use crate::error::{CoreError, CoreResult, RemovalFailure};
use crate::identity::{Caller, IdentityService};
use crate::saga::{Compensation, Saga};
use crate::schema::{
    check_answer_count, validate_comment, ScopeChange, SubmissionDraft, SubmissionPatch,
};

/// Outcome of a submission deletion.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRemoval {
    pub submission_id: SubmissionId,
    pub blobs_deleted: usize,
    /// Owned blobs left behind after the document was removed.
    pub failed: Vec<RemovalFailure>,
}

impl SubmissionRemoval {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct SubmissionService {
    repos: Repositories,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    assets: AssetManager,
    identity: Arc<dyn IdentityService>,
    limits: Limits,
}

impl SubmissionService {
    pub fn new(
        repos: Repositories,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        assets: AssetManager,
        identity: Arc<dyn IdentityService>,
        limits: Limits,
    ) -> Self {
        Self {
            repos,
            docs,
            blobs,
            assets,
            identity,
            limits,
        }
    }

    fn saga(&self, operation: &'static str) -> Saga {
        Saga::new(operation, Arc::clone(&self.docs), Arc::clone(&self.blobs))
    }

    /// Map discord tags to accounts, failing on the first unknown tag.
    async fn resolve_authors(&self, tags: &[String]) -> CoreResult<Vec<AccountId>> {
        let mut authors: Vec<AccountId> = Vec::with_capacity(tags.len());
        for tag in tags {
            let account = self
                .identity
                .resolve_tag(tag)
                .await?
                .ok_or_else(|| CoreError::Unauthorized(format!("unknown discord tag {tag:?}")))?;
            if !authors.contains(&account) {
                authors.push(account);
            }
        }
        Ok(authors)
    }

    async fn require_author(&self, caller: &Caller, submission: &Submission) -> CoreResult<()> {
        if self
            .repos
            .user_links
            .is_author(&submission.id, &caller.account_id)
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "{} is not an author of {:?}",
                caller.account_id, submission.name
            )))
        }
    }

    /// Organizers and the submission's authors may change its content and
    /// assets.
    pub async fn ensure_can_edit(&self, caller: &Caller, id: &SubmissionId) -> CoreResult<()> {
        let submission = self.repos.submissions.require(id).await?;
        if caller.organizer {
            return Ok(());
        }
        self.require_author(caller, &submission).await
    }

    async fn challenge_of(&self, submission: &Submission) -> CoreResult<Option<Challenge>> {
        match &submission.challenge_id {
            Some(id) => Ok(self.repos.challenges.get(id).await?),
            None => Ok(None),
        }
    }

    /// Enter a submission into `event_name`. The caller must be one of the
    /// authors named by `draft.discord_tags`.
    pub async fn create_submission(
        &self,
        caller: &Caller,
        event_name: &str,
        draft: SubmissionDraft,
    ) -> CoreResult<SubmissionId> {
        let draft = draft.validate(&self.limits)?;
        let event = self.repos.events.require_by_name(event_name.trim()).await?;
        if self
            .repos
            .submissions
            .by_name(&event.id, &draft.name)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                EntityKind::Submission,
                draft.name,
                format!("event {:?}", event.name),
            ));
        }
        let challenge = match &draft.challenge {
            Some(name) => Some(
                self.repos
                    .challenges
                    .by_name(&event.id, name)
                    .await?
                    .ok_or_else(|| CoreError::not_found(EntityKind::Challenge, name.as_str()))?,
            ),
            None => None,
        };
        check_answer_count(
            &draft.answers,
            challenge.as_ref().map_or(0, |c| c.questions.len()),
        )?;
        let authors = self.resolve_authors(&draft.discord_tags).await?;
        if !authors.contains(&caller.account_id) {
            return Err(CoreError::Forbidden(
                "the caller must be one of the submission's authors".into(),
            ));
        }

        let submission = Submission {
            id: SubmissionId::new(),
            name: draft.name,
            tags: draft.tags,
            links: draft.links,
            discord_tags: draft.discord_tags,
            event_id: Some(event.id.clone()),
            challenge_id: challenge.map(|c| c.id),
            answers: draft.answers,
            icon: None,
            source_code: None,
            markdown: None,
            photo0: None,
            photo1: None,
            photo2: None,
            accolade_ids: Vec::new(),
            like_ids: Vec::new(),
            comment_ids: Vec::new(),
            submitted_at: Utc::now(),
        };

        let mut saga = self.saga("create_submission");
        let result = async {
            self.repos.submissions.insert(&submission).await?;
            saga.record(Compensation::delete_document(
                Submission::COLLECTION,
                submission.id.as_str(),
            ));
            self.add_links(&mut saga, &submission.id, &authors).await?;
            saga.link(
                &self.repos.events,
                &event.id,
                fields::SUBMISSION_IDS,
                Value::from(&submission.id),
            )
            .await?;
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        tracing::info!(event = %event.name, submission_id = %submission.id, name = %submission.name,
            authors = authors.len(), "submission created");
        Ok(submission.id)
    }

    async fn add_links(
        &self,
        saga: &mut Saga,
        submission_id: &SubmissionId,
        authors: &[AccountId],
    ) -> CoreResult<()> {
        for author in authors {
            let link = UserSubmissionLink {
                id: UserLinkId::new(),
                user_auth_id: author.clone(),
                submission_id: submission_id.clone(),
            };
            self.repos.user_links.insert(&link).await?;
            saga.record(Compensation::delete_document(
                UserSubmissionLink::COLLECTION,
                link.id.as_str(),
            ));
        }
        Ok(())
    }

    /// Edit a submission. Only its authors may do this; a new author list
    /// replaces the authorship links.
    pub async fn update_submission(
        &self,
        caller: &Caller,
        id: &SubmissionId,
        patch: SubmissionPatch,
    ) -> CoreResult<SubmissionId> {
        let patch = patch.validate(&self.limits)?;
        let submission = self.repos.submissions.require(id).await?;
        self.require_author(caller, &submission).await?;

        let mut update = Update::new();
        let mut revert = Update::new();

        if let Some(name) = &patch.name {
            if name != &submission.name {
                if let Some(event_id) = &submission.event_id {
                    if self.repos.submissions.by_name(event_id, name).await?.is_some() {
                        return Err(CoreError::conflict(
                            EntityKind::Submission,
                            name,
                            format!("event {event_id}"),
                        ));
                    }
                }
            }
            update = update.set(fields::NAME, name.as_str());
            revert = revert.set(fields::NAME, submission.name.as_str());
        }
        if let Some(tags) = &patch.tags {
            update = update.set(fields::TAGS, tags.clone());
            revert = revert.set(fields::TAGS, submission.tags.clone());
        }
        if let Some(links) = &patch.links {
            update = update.set(fields::LINKS, links.clone());
            revert = revert.set(fields::LINKS, submission.links.clone());
        }

        let current = self.challenge_of(&submission).await?;
        let target = match &patch.challenge {
            None => current,
            Some(ScopeChange::Clear) => None,
            Some(ScopeChange::Challenge(name)) => {
                let event_id = submission.event_id.as_ref().ok_or_else(|| {
                    CoreError::validation("challenge", "submission is not entered in an event")
                })?;
                Some(
                    self.repos
                        .challenges
                        .by_name(event_id, name)
                        .await?
                        .ok_or_else(|| CoreError::not_found(EntityKind::Challenge, name.as_str()))?,
                )
            }
        };
        let target_id = target.as_ref().map(|c| &c.id);
        let rescoped = target_id != submission.challenge_id.as_ref();
        if rescoped || patch.answers.is_some() {
            let answers = patch.answers.clone().unwrap_or_default();
            check_answer_count(&answers, target.as_ref().map_or(0, |c| c.questions.len()))?;
            update = update.set(fields::ANSWERS, answers);
            revert = revert.set(fields::ANSWERS, submission.answers.clone());
        }
        if rescoped {
            update = update.set_or_unset(fields::CHALLENGE_ID, target_id);
            revert = revert.set_or_unset(fields::CHALLENGE_ID, submission.challenge_id.as_ref());
            // Awards scoped to the old challenge no longer apply.
            if let Some(old) = &submission.challenge_id {
                let scoped: Vec<Value> = self
                    .repos
                    .accolades
                    .for_challenge(old)
                    .await?
                    .iter()
                    .filter(|a| submission.accolade_ids.contains(&a.id))
                    .map(|a| Value::from(&a.id))
                    .collect();
                if !scoped.is_empty() {
                    update = update.pull_all(fields::ACCOLADE_IDS, scoped.clone());
                    for id in scoped {
                        revert = revert.add_to_set(fields::ACCOLADE_IDS, id);
                    }
                }
            }
        }

        let authors = match &patch.discord_tags {
            Some(tags) => {
                update = update.set(fields::DISCORD_TAGS, tags.clone());
                revert = revert.set(fields::DISCORD_TAGS, submission.discord_tags.clone());
                Some(self.resolve_authors(tags).await?)
            }
            None => None,
        };

        let mut saga = self.saga("update_submission");
        let result = async {
            if !self.repos.submissions.update(&submission.id, &update).await? {
                return Err(CoreError::not_found(EntityKind::Submission, submission.id.as_str()));
            }
            saga.record(Compensation::apply(
                Submission::COLLECTION,
                submission.id.as_str(),
                revert,
            ));
            if let Some(authors) = &authors {
                let existing = self.repos.user_links.for_submission(&submission.id).await?;
                let added: Vec<AccountId> = authors
                    .iter()
                    .filter(|a| !existing.iter().any(|l| &l.user_auth_id == *a))
                    .cloned()
                    .collect();
                self.add_links(&mut saga, &submission.id, &added).await?;
                for stale in existing.iter().filter(|l| !authors.contains(&l.user_auth_id)) {
                    let restore = Compensation::restore(stale)?;
                    if self.repos.user_links.delete(&stale.id).await?.is_some() {
                        saga.record(restore);
                    }
                }
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        tracing::info!(submission_id = %submission.id, rescoped,
            authors_changed = authors.is_some(), "submission updated");
        Ok(submission.id)
    }

    /// Delete a submission with its likes, comments, authorship links and
    /// blobs. Authors and organizers may do this.
    ///
    /// Blobs are purged once the document is gone; a blob that cannot be
    /// deleted is reported in [`SubmissionRemoval::failed`].
    pub async fn delete_submission(
        &self,
        caller: &Caller,
        id: &SubmissionId,
    ) -> CoreResult<SubmissionRemoval> {
        let submission = self.repos.submissions.require(id).await?;
        if !caller.organizer {
            self.require_author(caller, &submission).await?;
        }

        let mut saga = self.saga("delete_submission");
        let result = async {
            if let Some(event_id) = &submission.event_id {
                saga.unlink(
                    &self.repos.events,
                    event_id,
                    fields::SUBMISSION_IDS,
                    Value::from(&submission.id),
                )
                .await?;
            }
            for like in self.repos.likes.for_submission(&submission.id).await? {
                let restore = Compensation::restore(&like)?;
                if self.repos.likes.delete(&like.id).await?.is_some() {
                    saga.record(restore);
                }
            }
            for comment in self.repos.comments.for_submission(&submission.id).await? {
                let restore = Compensation::restore(&comment)?;
                if self.repos.comments.delete(&comment.id).await?.is_some() {
                    saga.record(restore);
                }
            }
            for link in self.repos.user_links.for_submission(&submission.id).await? {
                let restore = Compensation::restore(&link)?;
                if self.repos.user_links.delete(&link.id).await?.is_some() {
                    saga.record(restore);
                }
            }
            if self.repos.submissions.delete(&submission.id).await?.is_none() {
                return Err(CoreError::not_found(EntityKind::Submission, submission.id.as_str()));
            }
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;

        let mut removal = SubmissionRemoval {
            submission_id: submission.id.clone(),
            blobs_deleted: 0,
            failed: Vec::new(),
        };
        match self.assets.purge(&submission).await {
            Ok(deleted) => removal.blobs_deleted = deleted,
            Err(e) => removal.failed.push(RemovalFailure {
                name: submission.name.clone(),
                reason: format!("assets not deleted: {e}"),
            }),
        }
        if removal.is_complete() {
            tracing::info!(submission_id = %submission.id, name = %submission.name,
                by = %caller.account_id, "submission deleted");
        } else {
            tracing::warn!(submission_id = %submission.id, name = %submission.name,
                by = %caller.account_id, "submission deleted, blobs left behind");
        }
        Ok(removal)
    }

    // ---------------------------------------------------------------------
    // Likes
    // ---------------------------------------------------------------------

    /// Like a submission. Liking twice returns the existing like.
    pub async fn like(&self, caller: &Caller, submission_id: &SubmissionId) -> CoreResult<LikeId> {
        let submission = self.repos.submissions.require(submission_id).await?;
        if let Some(like) = self
            .repos
            .likes
            .by_user(&submission.id, &caller.account_id)
            .await?
        {
            tracing::warn!(%submission_id, user = %caller.account_id, "already liked");
            return Ok(like.id);
        }
        let like = Like {
            id: LikeId::new(),
            user_auth_id: caller.account_id.clone(),
            submission_id: submission.id.clone(),
        };
        let mut saga = self.saga("like");
        let result = async {
            self.repos.likes.insert(&like).await?;
            saga.record(Compensation::delete_document(Like::COLLECTION, like.id.as_str()));
            saga.link(
                &self.repos.submissions,
                &submission.id,
                fields::LIKE_IDS,
                Value::from(&like.id),
            )
            .await?;
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;
        tracing::info!(%submission_id, user = %caller.account_id, "submission liked");
        Ok(like.id)
    }

    /// Remove the caller's like. Returns `false` if there was none.
    pub async fn unlike(&self, caller: &Caller, submission_id: &SubmissionId) -> CoreResult<bool> {
        let Some(like) = self
            .repos
            .likes
            .by_user(submission_id, &caller.account_id)
            .await?
        else {
            tracing::warn!(%submission_id, user = %caller.account_id, "not liked, nothing to remove");
            return Ok(false);
        };
        let mut saga = self.saga("unlike");
        let result = async {
            saga.unlink(
                &self.repos.submissions,
                submission_id,
                fields::LIKE_IDS,
                Value::from(&like.id),
            )
            .await?;
            self.repos.likes.delete(&like.id).await?;
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;
        tracing::info!(%submission_id, user = %caller.account_id, "like removed");
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Comments
    // ---------------------------------------------------------------------

    pub async fn comment(
        &self,
        caller: &Caller,
        submission_id: &SubmissionId,
        message: &str,
    ) -> CoreResult<CommentId> {
        let message = validate_comment(message, &self.limits)?;
        let submission = self.repos.submissions.require(submission_id).await?;
        let comment = Comment {
            id: CommentId::new(),
            user_auth_id: caller.account_id.clone(),
            submission_id: submission.id.clone(),
            message,
            posted_at: Utc::now(),
        };
        let mut saga = self.saga("comment");
        let result = async {
            self.repos.comments.insert(&comment).await?;
            saga.record(Compensation::delete_document(
                Comment::COLLECTION,
                comment.id.as_str(),
            ));
            saga.link(
                &self.repos.submissions,
                &submission.id,
                fields::COMMENT_IDS,
                Value::from(&comment.id),
            )
            .await?;
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;
        tracing::info!(%submission_id, comment_id = %comment.id, user = %caller.account_id,
            "comment posted");
        Ok(comment.id)
    }

    /// Delete a comment. Its author and organizers may do this.
    pub async fn delete_comment(&self, caller: &Caller, id: &CommentId) -> CoreResult<()> {
        let comment = self.repos.comments.require(id).await?;
        if comment.user_auth_id != caller.account_id && !caller.organizer {
            return Err(CoreError::Forbidden(format!(
                "{} did not write this comment",
                caller.account_id
            )));
        }
        let mut saga = self.saga("delete_comment");
        let result = async {
            saga.unlink(
                &self.repos.submissions,
                &comment.submission_id,
                fields::COMMENT_IDS,
                Value::from(&comment.id),
            )
            .await?;
            self.repos.comments.delete(&comment.id).await?;
            Ok::<_, CoreError>(())
        }
        .await;
        saga.finish(result).await?;
        tracing::info!(comment_id = %comment.id, by = %caller.account_id, "comment deleted");
        Ok(())
    }
}

impl std::fmt::Debug for SubmissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionService")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
