//! Read-side façade: events and submissions with their references embedded.
//!
//! Reads take no locks. A reference whose target was deleted between the
//! parent read and the child reads is skipped, never reported as an error.

use hh_repo::Repositories;
use hh_types::{
    Accolade, AccountId, Challenge, Comment, Event, EventId, Submission, SubmissionId,
};
use serde::Serialize;

use crate::error::CoreResult;

/// An event with its challenges, accolades and submissions resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullEvent {
    #[serde(flatten)]
    pub event: Event,
    pub challenges: Vec<Challenge>,
    pub accolades: Vec<Accolade>,
    pub submissions: Vec<Submission>,
}

/// Result of [`QueryFacade::get_event`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventView {
    Full(Box<FullEvent>),
    Summary(Event),
}

impl EventView {
    pub fn event(&self) -> &Event {
        match self {
            Self::Full(full) => &full.event,
            Self::Summary(event) => event,
        }
    }
}

/// A submission with everything a detail page shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSubmission {
    #[serde(flatten)]
    pub submission: Submission,
    pub challenge: Option<Challenge>,
    pub accolades: Vec<Accolade>,
    pub comments: Vec<Comment>,
    pub like_count: usize,
    pub authors: Vec<AccountId>,
}

#[derive(Clone, Debug)]
pub struct QueryFacade {
    repos: Repositories,
}

impl QueryFacade {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn get_event_full(&self, id: &EventId) -> CoreResult<FullEvent> {
        let event = self.repos.events.require(id).await?;
        self.expand(event).await
    }

    /// Look an event up by name, optionally with its references embedded.
    pub async fn get_event(&self, name: &str, full: bool) -> CoreResult<EventView> {
        let event = self.repos.events.require_by_name(name.trim()).await?;
        if full {
            Ok(EventView::Full(Box::new(self.expand(event).await?)))
        } else {
            Ok(EventView::Summary(event))
        }
    }

    /// Whether a submission's event is hidden. Unattached submissions and
    /// dangling event references count as visible.
    pub async fn in_hidden_event(&self, submission: &Submission) -> CoreResult<bool> {
        let Some(event_id) = &submission.event_id else {
            return Ok(false);
        };
        Ok(self
            .repos
            .events
            .get(event_id)
            .await?
            .is_some_and(|event| event.hidden))
    }

    /// Events ordered by start time; hidden ones only when asked for.
    pub async fn list_events(&self, include_hidden: bool) -> CoreResult<Vec<Event>> {
        Ok(self.repos.events.list(include_hidden).await?)
    }

    async fn expand(&self, event: Event) -> CoreResult<FullEvent> {
        let challenges = self.repos.challenges.get_many(&event.challenge_ids).await?;
        let accolades = self.repos.accolades.get_many(&event.accolade_ids).await?;
        let submissions = self.repos.submissions.get_many(&event.submission_ids).await?;
        let referenced =
            event.challenge_ids.len() + event.accolade_ids.len() + event.submission_ids.len();
        let dangling =
            referenced.saturating_sub(challenges.len() + accolades.len() + submissions.len());
        if dangling > 0 {
            tracing::debug!(event_id = %event.id, dangling, "skipped dangling references");
        }
        Ok(FullEvent {
            event,
            challenges,
            accolades,
            submissions,
        })
    }

    pub async fn get_submission_full(&self, id: &SubmissionId) -> CoreResult<FullSubmission> {
        let submission = self.repos.submissions.require(id).await?;
        let challenge = match &submission.challenge_id {
            Some(challenge_id) => self.repos.challenges.get(challenge_id).await?,
            None => None,
        };
        let accolades = self.repos.accolades.get_many(&submission.accolade_ids).await?;
        let comments = self.repos.comments.get_many(&submission.comment_ids).await?;
        let like_count = self.repos.likes.get_many(&submission.like_ids).await?.len();
        let authors = self
            .repos
            .user_links
            .for_submission(&submission.id)
            .await?
            .into_iter()
            .map(|link| link.user_auth_id)
            .collect();
        Ok(FullSubmission {
            submission,
            challenge,
            accolades,
            comments,
            like_count,
            authors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::schema::{AccoladeDraft, ChallengeDraft, EventDraft, SubmissionDraft};
    use crate::testing::{ada, bob, harness, t0};
    use chrono::Duration;
    use hh_store::{Collection, DocumentStore, Filter};
    use hh_types::EntityKind;

    fn event_draft(name: &str, hidden: bool) -> EventDraft {
        EventDraft {
            name: name.into(),
            description: String::new(),
            hidden,
            start: t0(),
            end: t0() + Duration::days(2),
        }
    }

    #[tokio::test]
    async fn full_event_embeds_references() {
        let h = harness();
        let event_id = h.hub.coordinator.add_event(event_draft("Hack1", false)).await.unwrap();
        h.hub
            .coordinator
            .create_challenge(
                "Hack1",
                ChallengeDraft {
                    title: "Best UI".into(),
                    questions: vec![],
                    places: 3,
                    accolade_names: vec![],
                },
            )
            .await
            .unwrap();
        h.hub
            .coordinator
            .add_accolade(
                "Hack1",
                AccoladeDraft {
                    name: "Winner".into(),
                    description: String::new(),
                    emoji: "🏆".into(),
                    challenge: None,
                },
            )
            .await
            .unwrap();
        h.hub
            .submissions
            .create_submission(
                &ada(),
                "Hack1",
                SubmissionDraft {
                    name: "Robo".into(),
                    tags: vec![],
                    links: vec![],
                    discord_tags: vec!["ada#0001".into()],
                    challenge: None,
                    answers: vec![],
                },
            )
            .await
            .unwrap();

        let full = h.hub.query.get_event_full(&event_id).await.unwrap();
        assert_eq!(full.event.name, "Hack1");
        assert_eq!(full.challenges.len(), 1);
        assert_eq!(full.challenges[0].name, "Best UI");
        assert_eq!(full.accolades[0].name, "Winner");
        assert_eq!(full.submissions[0].name, "Robo");

        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["name"], "Hack1");
        assert_eq!(json["challenges"][0]["name"], "Best UI");
    }

    #[tokio::test]
    async fn get_event_summary_and_full() {
        let h = harness();
        h.hub.coordinator.add_event(event_draft("Hack1", false)).await.unwrap();

        let summary = h.hub.query.get_event("Hack1", false).await.unwrap();
        assert!(matches!(summary, EventView::Summary(_)));
        let full = h.hub.query.get_event(" Hack1 ", true).await.unwrap();
        assert!(matches!(full, EventView::Full(_)));
        assert_eq!(full.event().name, "Hack1");

        let err = h.hub.query.get_event("Nope", false).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Event, .. }));
    }

    #[tokio::test]
    async fn dangling_reference_is_skipped() {
        let h = harness();
        let event_id = h.hub.coordinator.add_event(event_draft("Hack1", false)).await.unwrap();
        let challenge_id = h
            .hub
            .coordinator
            .create_challenge(
                "Hack1",
                ChallengeDraft {
                    title: "Best UI".into(),
                    questions: vec![],
                    places: 1,
                    accolade_names: vec![],
                },
            )
            .await
            .unwrap();
        // Simulate a concurrent delete that has not unlinked yet.
        h.docs
            .inner()
            .delete_one(Collection::Challenges, &Filter::id(challenge_id.as_str()))
            .await
            .unwrap();

        let full = h.hub.query.get_event_full(&event_id).await.unwrap();
        assert_eq!(full.event.challenge_ids, vec![challenge_id]);
        assert!(full.challenges.is_empty());
    }

    #[tokio::test]
    async fn hidden_events_are_listed_on_request() {
        let h = harness();
        h.hub.coordinator.add_event(event_draft("Open", false)).await.unwrap();
        h.hub.coordinator.add_event(event_draft("Secret", true)).await.unwrap();

        let public = h.hub.query.list_events(false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "Open");
        assert_eq!(h.hub.query.list_events(true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_submission_collects_details() {
        let h = harness();
        h.hub.coordinator.add_event(event_draft("Hack1", false)).await.unwrap();
        let submission_id = h
            .hub
            .submissions
            .create_submission(
                &ada(),
                "Hack1",
                SubmissionDraft {
                    name: "Robo".into(),
                    tags: vec!["rust".into()],
                    links: vec![],
                    discord_tags: vec!["ada#0001".into(), "bob#0002".into()],
                    challenge: None,
                    answers: vec![],
                },
            )
            .await
            .unwrap();
        h.hub.submissions.like(&ada(), &submission_id).await.unwrap();
        h.hub.submissions.like(&bob(), &submission_id).await.unwrap();
        h.hub
            .submissions
            .comment(&bob(), &submission_id, "nice")
            .await
            .unwrap();

        let full = h.hub.query.get_submission_full(&submission_id).await.unwrap();
        assert_eq!(full.like_count, 2);
        assert_eq!(full.comments.len(), 1);
        assert_eq!(full.comments[0].message, "nice");
        assert!(full.challenge.is_none());
        let mut authors: Vec<_> = full.authors.iter().map(|a| a.as_str().to_string()).collect();
        authors.sort();
        assert_eq!(authors, vec!["ada", "bob"]);
    }
}
