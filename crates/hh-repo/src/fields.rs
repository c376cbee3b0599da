//! Document field names shared by repositories and the coordinator.

pub const ID: &str = "_id";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const HIDDEN: &str = "hidden";
pub const START: &str = "start";
pub const END: &str = "end";
pub const EMOJI: &str = "emoji";
pub const PLACES: &str = "places";
pub const QUESTIONS: &str = "questions";
pub const TAGS: &str = "tags";
pub const LINKS: &str = "links";
pub const DISCORD_TAGS: &str = "discordTags";
pub const ANSWERS: &str = "answers";
pub const MESSAGE: &str = "message";

pub const EVENT_ID: &str = "eventId";
pub const CHALLENGE_ID: &str = "challengeId";
pub const SUBMISSION_ID: &str = "submissionId";
pub const USER_AUTH_ID: &str = "userAuthId";

pub const CHALLENGE_IDS: &str = "challengeIds";
pub const ACCOLADE_IDS: &str = "accoladeIds";
pub const SUBMISSION_IDS: &str = "submissionIds";
pub const LIKE_IDS: &str = "likeIds";
pub const COMMENT_IDS: &str = "commentIds";
