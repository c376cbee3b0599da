use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use hh_store::{DocumentStore, Filter, Update, UpdateOutcome};
use hh_types::{
    Accolade, AccoladeId, AccountId, Challenge, ChallengeId, Comment, Event, EventId, Like,
    Submission, SubmissionId, UserSubmissionLink,
};
use serde_json::Value;

use crate::entity::Entity;
use crate::error::{RepoError, Result};
use crate::fields;

/// Typed access to one entity collection.
///
/// Cheap to clone: it only holds a handle to the shared document store.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T>
where
    T: Entity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &T::COLLECTION)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// The underlying document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn id_filter(id: &T::Id) -> Filter {
        Filter::id(id.as_ref())
    }

    fn decode(doc: Value) -> Result<T> {
        let id = doc
            .get(fields::ID)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        serde_json::from_value(doc).map_err(|e| RepoError::Decode {
            kind: T::KIND,
            id,
            reason: e.to_string(),
        })
    }

    /// Insert a new record.
    pub async fn insert(&self, entity: &T) -> Result<()> {
        let doc = serde_json::to_value(entity).map_err(|e| RepoError::Decode {
            kind: T::KIND,
            id: entity.id().as_ref().to_string(),
            reason: e.to_string(),
        })?;
        self.store.insert_one(T::COLLECTION, doc).await?;
        Ok(())
    }

    /// Look up by id. Returns `Ok(None)` if absent.
    pub async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        self.find_one(&Self::id_filter(id)).await
    }

    /// Look up by id, failing with [`RepoError::NotFound`] if absent.
    pub async fn require(&self, id: &T::Id) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| RepoError::not_found(T::KIND, id.as_ref()))
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<T>> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Resolve many ids, preserving the order of `ids` and skipping any
    /// that no longer exist.
    pub async fn get_many(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::all().one_of(fields::ID, ids.iter().map(|id| id.as_ref()));
        let mut by_id: HashMap<String, T> = self
            .find(&filter)
            .await?
            .into_iter()
            .map(|e| (e.id().as_ref().to_string(), e))
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id.as_ref()))
            .collect())
    }

    pub async fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self.store.count(T::COLLECTION, filter).await?)
    }

    /// Apply `update` to the record. Returns `false` if it does not exist.
    pub async fn update(&self, id: &T::Id, update: &Update) -> Result<bool> {
        if update.is_empty() {
            return Ok(self.get(id).await?.is_some());
        }
        let outcome = self
            .store
            .update_one(T::COLLECTION, &Self::id_filter(id), update)
            .await?;
        Ok(outcome.is_matched())
    }

    /// Like [`Self::update`] but fails with `NotFound` when nothing matched.
    pub async fn update_existing(&self, id: &T::Id, update: &Update) -> Result<()> {
        if self.update(id, update).await? {
            Ok(())
        } else {
            Err(RepoError::not_found(T::KIND, id.as_ref()))
        }
    }

    /// `$addToSet` a single value. `modified` is zero when the value was
    /// already present or the record is missing.
    pub async fn add_to_set(
        &self,
        id: &T::Id,
        field: &str,
        value: impl Into<Value> + Send,
    ) -> Result<UpdateOutcome> {
        self.apply(id, &Update::new().add_to_set(field, value)).await
    }

    /// `$pull` a single value. `modified` is zero when the value was absent
    /// or the record is missing.
    pub async fn pull(
        &self,
        id: &T::Id,
        field: &str,
        value: impl Into<Value> + Send,
    ) -> Result<UpdateOutcome> {
        self.apply(id, &Update::new().pull(field, value)).await
    }

    async fn apply(&self, id: &T::Id, update: &Update) -> Result<UpdateOutcome> {
        Ok(self
            .store
            .update_one(T::COLLECTION, &Self::id_filter(id), update)
            .await?)
    }

    /// Delete by id, returning the removed record.
    pub async fn delete(&self, id: &T::Id) -> Result<Option<T>> {
        self.store
            .find_one_and_delete(T::COLLECTION, &Self::id_filter(id))
            .await?
            .map(Self::decode)
            .transpose()
    }
}

pub type EventRepo = Repository<Event>;
pub type ChallengeRepo = Repository<Challenge>;
pub type AccoladeRepo = Repository<Accolade>;
pub type SubmissionRepo = Repository<Submission>;
pub type LikeRepo = Repository<Like>;
pub type CommentRepo = Repository<Comment>;
pub type UserLinkRepo = Repository<UserSubmissionLink>;

// ---------------------------------------------------------------------------
// Per-entity lookups
// ---------------------------------------------------------------------------

impl Repository<Event> {
    /// Event names are unique across the catalog.
    pub async fn by_name(&self, name: &str) -> Result<Option<Event>> {
        self.find_one(&Filter::all().eq(fields::NAME, name)).await
    }

    pub async fn require_by_name(&self, name: &str) -> Result<Event> {
        self.by_name(name)
            .await?
            .ok_or_else(|| RepoError::not_found(hh_types::EntityKind::Event, name))
    }

    /// All events, hidden ones only when `include_hidden`.
    pub async fn list(&self, include_hidden: bool) -> Result<Vec<Event>> {
        let filter = if include_hidden {
            Filter::all()
        } else {
            Filter::all().eq(fields::HIDDEN, false)
        };
        let mut events = self.find(&filter).await?;
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));
        Ok(events)
    }
}

impl Repository<Challenge> {
    /// Challenge names are unique within their event.
    pub async fn by_name(&self, event_id: &EventId, name: &str) -> Result<Option<Challenge>> {
        self.find_one(
            &Filter::all()
                .eq(fields::EVENT_ID, event_id)
                .eq(fields::NAME, name),
        )
        .await
    }

    pub async fn for_event(&self, event_id: &EventId) -> Result<Vec<Challenge>> {
        self.find(&Filter::all().eq(fields::EVENT_ID, event_id)).await
    }
}

impl Repository<Accolade> {
    /// Every accolade in the event carrying `name`, across all scopes.
    pub async fn by_name(&self, event_id: &EventId, name: &str) -> Result<Vec<Accolade>> {
        self.find(
            &Filter::all()
                .eq(fields::EVENT_ID, event_id)
                .eq(fields::NAME, name),
        )
        .await
    }

    /// The accolade named `name` in exactly the given scope
    /// (`None` = event-wide).
    pub async fn in_scope(
        &self,
        event_id: &EventId,
        name: &str,
        challenge_id: Option<&ChallengeId>,
    ) -> Result<Option<Accolade>> {
        let filter = Filter::all()
            .eq(fields::EVENT_ID, event_id)
            .eq(fields::NAME, name);
        let filter = match challenge_id {
            Some(id) => filter.eq(fields::CHALLENGE_ID, id),
            None => filter.missing(fields::CHALLENGE_ID),
        };
        self.find_one(&filter).await
    }

    pub async fn for_event(&self, event_id: &EventId) -> Result<Vec<Accolade>> {
        self.find(&Filter::all().eq(fields::EVENT_ID, event_id)).await
    }

    pub async fn for_challenge(&self, challenge_id: &ChallengeId) -> Result<Vec<Accolade>> {
        self.find(&Filter::all().eq(fields::CHALLENGE_ID, challenge_id))
            .await
    }
}

impl Repository<Submission> {
    pub async fn for_event(&self, event_id: &EventId) -> Result<Vec<Submission>> {
        self.find(&Filter::all().eq(fields::EVENT_ID, event_id)).await
    }

    pub async fn for_challenge(&self, challenge_id: &ChallengeId) -> Result<Vec<Submission>> {
        self.find(&Filter::all().eq(fields::CHALLENGE_ID, challenge_id))
            .await
    }

    /// Submissions that were awarded `accolade_id`.
    pub async fn with_accolade(&self, accolade_id: &AccoladeId) -> Result<Vec<Submission>> {
        self.find(&Filter::all().eq(fields::ACCOLADE_IDS, accolade_id))
            .await
    }

    /// Submission in the event with the given name, if any.
    pub async fn by_name(&self, event_id: &EventId, name: &str) -> Result<Option<Submission>> {
        self.find_one(
            &Filter::all()
                .eq(fields::EVENT_ID, event_id)
                .eq(fields::NAME, name),
        )
        .await
    }
}

impl Repository<Like> {
    pub async fn by_user(
        &self,
        submission_id: &SubmissionId,
        user: &AccountId,
    ) -> Result<Option<Like>> {
        self.find_one(
            &Filter::all()
                .eq(fields::SUBMISSION_ID, submission_id)
                .eq(fields::USER_AUTH_ID, user),
        )
        .await
    }

    pub async fn for_submission(&self, submission_id: &SubmissionId) -> Result<Vec<Like>> {
        self.find(&Filter::all().eq(fields::SUBMISSION_ID, submission_id))
            .await
    }
}

impl Repository<Comment> {
    pub async fn for_submission(&self, submission_id: &SubmissionId) -> Result<Vec<Comment>> {
        self.find(&Filter::all().eq(fields::SUBMISSION_ID, submission_id))
            .await
    }
}

impl Repository<UserSubmissionLink> {
    pub async fn for_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Vec<UserSubmissionLink>> {
        self.find(&Filter::all().eq(fields::SUBMISSION_ID, submission_id))
            .await
    }

    pub async fn for_user(&self, user: &AccountId) -> Result<Vec<UserSubmissionLink>> {
        self.find(&Filter::all().eq(fields::USER_AUTH_ID, user)).await
    }

    /// Whether `user` is linked as an author of the submission.
    pub async fn is_author(&self, submission_id: &SubmissionId, user: &AccountId) -> Result<bool> {
        let filter = Filter::all()
            .eq(fields::SUBMISSION_ID, submission_id)
            .eq(fields::USER_AUTH_ID, user);
        Ok(self.count(&filter).await? > 0)
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Every entity repository over one shared document store.
#[derive(Clone, Debug)]
pub struct Repositories {
    pub events: EventRepo,
    pub challenges: ChallengeRepo,
    pub accolades: AccoladeRepo,
    pub submissions: SubmissionRepo,
    pub likes: LikeRepo,
    pub comments: CommentRepo,
    pub user_links: UserLinkRepo,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            events: Repository::new(Arc::clone(&store)),
            challenges: Repository::new(Arc::clone(&store)),
            accolades: Repository::new(Arc::clone(&store)),
            submissions: Repository::new(Arc::clone(&store)),
            likes: Repository::new(Arc::clone(&store)),
            comments: Repository::new(Arc::clone(&store)),
            user_links: Repository::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use hh_store::InMemoryDocumentStore;
    use hh_types::EntityKind;

    fn repos() -> Repositories {
        Repositories::new(Arc::new(InMemoryDocumentStore::new()))
    }

    fn event(name: &str, hidden: bool, day: u32) -> Event {
        let start = Utc.with_ymd_and_hms(2026, 5, day, 9, 0, 0).unwrap();
        Event {
            id: EventId::new(),
            name: name.into(),
            description: String::new(),
            hidden,
            start,
            end: start + Duration::days(1),
            image: None,
            challenge_ids: vec![],
            accolade_ids: vec![],
            submission_ids: vec![],
        }
    }

    fn accolade(event_id: &EventId, name: &str, challenge: Option<&ChallengeId>) -> Accolade {
        Accolade {
            id: AccoladeId::new(),
            name: name.into(),
            description: String::new(),
            emoji: "🏆".into(),
            event_id: event_id.clone(),
            challenge_id: challenge.cloned(),
        }
    }

    // ---- Generic CRUD ----

    #[tokio::test]
    async fn insert_get_require_delete() {
        let r = repos();
        let e = event("Hack1", false, 1);
        r.events.insert(&e).await.unwrap();
        assert_eq!(r.events.get(&e.id).await.unwrap().unwrap(), e);
        assert_eq!(r.events.require(&e.id).await.unwrap().name, "Hack1");

        let removed = r.events.delete(&e.id).await.unwrap().unwrap();
        assert_eq!(removed.id, e.id);
        let err = r.events.require(&e.id).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::NotFound {
                kind: EntityKind::Event,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn add_to_set_and_pull() {
        let r = repos();
        let e = event("Hack1", false, 1);
        r.events.insert(&e).await.unwrap();
        let c = ChallengeId::new();
        let outcome = r
            .events
            .add_to_set(&e.id, fields::CHALLENGE_IDS, &c)
            .await
            .unwrap();
        assert!(outcome.is_modified());
        let again = r
            .events
            .add_to_set(&e.id, fields::CHALLENGE_IDS, &c)
            .await
            .unwrap();
        assert!(again.is_matched() && !again.is_modified());
        assert_eq!(
            r.events.require(&e.id).await.unwrap().challenge_ids,
            vec![c.clone()]
        );
        assert!(r
            .events
            .pull(&e.id, fields::CHALLENGE_IDS, &c)
            .await
            .unwrap()
            .is_modified());
        assert!(r.events.require(&e.id).await.unwrap().challenge_ids.is_empty());
        assert!(!r
            .events
            .add_to_set(&EventId::new(), fields::CHALLENGE_IDS, &c)
            .await
            .unwrap()
            .is_matched());
    }

    #[tokio::test]
    async fn update_existing_reports_missing() {
        let r = repos();
        let err = r
            .events
            .update_existing(&EventId::new(), &Update::new().set(fields::NAME, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_many_preserves_order_and_skips_missing() {
        let r = repos();
        let a = event("A", false, 1);
        let b = event("B", false, 2);
        r.events.insert(&a).await.unwrap();
        r.events.insert(&b).await.unwrap();
        let ghost = EventId::new();
        let got = r
            .events
            .get_many(&[b.id.clone(), ghost, a.id.clone()])
            .await
            .unwrap();
        let names: Vec<&str> = got.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(r.events.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_reports_decode_error() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        store
            .insert_one(
                hh_store::Collection::Events,
                serde_json::json!({"_id": "bad", "name": 42}),
            )
            .await
            .unwrap();
        let r = Repositories::new(store);
        let err = r
            .events
            .get(&EventId::from_raw("bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Decode { .. }));
    }

    // ---- Lookups ----

    #[tokio::test]
    async fn events_by_name_and_listing() {
        let r = repos();
        r.events.insert(&event("Later", false, 20)).await.unwrap();
        r.events.insert(&event("Secret", true, 5)).await.unwrap();
        r.events.insert(&event("Early", false, 2)).await.unwrap();

        assert!(r.events.by_name("Secret").await.unwrap().is_some());
        assert!(r.events.by_name("secret").await.unwrap().is_none());
        assert!(r.events.require_by_name("Nope").await.is_err());

        let public: Vec<String> = r
            .events
            .list(false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(public, vec!["Early", "Later"]);
        assert_eq!(r.events.list(true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn accolade_scope_lookups() {
        let r = repos();
        let e = EventId::new();
        let c1 = ChallengeId::new();
        let c2 = ChallengeId::new();
        let global = accolade(&e, "Winner", None);
        let scoped = accolade(&e, "Winner", Some(&c1));
        r.accolades.insert(&global).await.unwrap();
        r.accolades.insert(&scoped).await.unwrap();

        assert_eq!(r.accolades.by_name(&e, "Winner").await.unwrap().len(), 2);
        assert_eq!(
            r.accolades.in_scope(&e, "Winner", None).await.unwrap().unwrap().id,
            global.id
        );
        assert_eq!(
            r.accolades
                .in_scope(&e, "Winner", Some(&c1))
                .await
                .unwrap()
                .unwrap()
                .id,
            scoped.id
        );
        assert!(r
            .accolades
            .in_scope(&e, "Winner", Some(&c2))
            .await
            .unwrap()
            .is_none());
        assert_eq!(r.accolades.for_challenge(&c1).await.unwrap().len(), 1);
        assert_eq!(r.accolades.for_event(&e).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn user_links_and_likes() {
        let r = repos();
        let s = SubmissionId::new();
        let ada = AccountId::from_raw("ada");
        let bob = AccountId::from_raw("bob");
        r.user_links
            .insert(&UserSubmissionLink {
                id: hh_types::UserLinkId::new(),
                user_auth_id: ada.clone(),
                submission_id: s.clone(),
            })
            .await
            .unwrap();
        assert!(r.user_links.is_author(&s, &ada).await.unwrap());
        assert!(!r.user_links.is_author(&s, &bob).await.unwrap());
        assert_eq!(r.user_links.for_user(&ada).await.unwrap().len(), 1);

        r.likes
            .insert(&Like {
                id: hh_types::LikeId::new(),
                user_auth_id: bob.clone(),
                submission_id: s.clone(),
            })
            .await
            .unwrap();
        assert!(r.likes.by_user(&s, &bob).await.unwrap().is_some());
        assert!(r.likes.by_user(&s, &ada).await.unwrap().is_none());
        assert_eq!(r.likes.for_submission(&s).await.unwrap().len(), 1);
    }
}
