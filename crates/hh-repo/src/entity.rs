use hh_store::Collection;
use hh_types::{
    Accolade, Challenge, Comment, EntityKind, Event, Like, Submission, UserSubmissionLink,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record type persisted in its own collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier newtype of this entity.
    type Id: AsRef<str> + Clone + Send + Sync;

    const COLLECTION: Collection;
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;
}

macro_rules! impl_entity {
    ($ty:ty, $id:ty, $collection:expr, $kind:expr) => {
        impl Entity for $ty {
            type Id = $id;

            const COLLECTION: Collection = $collection;
            const KIND: EntityKind = $kind;

            fn id(&self) -> &Self::Id {
                &self.id
            }
        }
    };
}

impl_entity!(Event, hh_types::EventId, Collection::Events, EntityKind::Event);
impl_entity!(
    Challenge,
    hh_types::ChallengeId,
    Collection::Challenges,
    EntityKind::Challenge
);
impl_entity!(
    Accolade,
    hh_types::AccoladeId,
    Collection::Accolades,
    EntityKind::Accolade
);
impl_entity!(
    Submission,
    hh_types::SubmissionId,
    Collection::Submissions,
    EntityKind::Submission
);
impl_entity!(Like, hh_types::LikeId, Collection::Likes, EntityKind::Like);
impl_entity!(
    Comment,
    hh_types::CommentId,
    Collection::Comments,
    EntityKind::Comment
);
impl_entity!(
    UserSubmissionLink,
    hh_types::UserLinkId,
    Collection::UserSubmissionLinks,
    EntityKind::UserSubmissionLink
);
