//! Typed request payloads.
//!
//! Every write enters the core as one of these drafts or patches. Each has a
//! `validate` step that checks and normalizes the fields against [`Limits`]
//! before the first store call, so a rejected request never writes.

use std::collections::HashSet;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hh_repo::names::{validate_emoji, validate_name, validate_required_text, validate_text};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Limits;
use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventDraft {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        check_window(self.start, self.end)?;
        Ok(Self {
            name: validate_name("name", &self.name)?,
            description: validate_text(
                "description",
                &self.description,
                limits.max_description_chars,
            )?,
            ..self
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// Validate the fields present; the date window is checked against the
    /// stored values by the coordinator.
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(|n| validate_name("name", n)).transpose()?,
            description: self
                .description
                .as_deref()
                .map(|d| validate_text("description", d, limits.max_description_chars))
                .transpose()?,
            ..self
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// `start` must be strictly before `end`.
pub fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<()> {
    if start >= end {
        return Err(CoreError::validation("end", "must be after start"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Challenges
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDraft {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<String>,
    pub places: u32,
    /// Existing accolades to scope to the new challenge.
    #[serde(default)]
    pub accolade_names: Vec<String>,
}

impl ChallengeDraft {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        check_places(self.places, limits)?;
        let mut accolade_names = Vec::with_capacity(self.accolade_names.len());
        for name in &self.accolade_names {
            let name = validate_name("accoladeNames", name)?;
            if !accolade_names.contains(&name) {
                accolade_names.push(name);
            }
        }
        Ok(Self {
            title: validate_name("title", &self.title)?,
            questions: check_questions(&self.questions, limits)?,
            places: self.places,
            accolade_names,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengePatch {
    pub name: Option<String>,
    pub questions: Option<Vec<String>>,
    pub places: Option<u32>,
}

impl ChallengePatch {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        if let Some(places) = self.places {
            check_places(places, limits)?;
        }
        Ok(Self {
            name: self.name.as_deref().map(|n| validate_name("name", n)).transpose()?,
            questions: self
                .questions
                .as_deref()
                .map(|q| check_questions(q, limits))
                .transpose()?,
            places: self.places,
        })
    }
}

fn check_places(places: u32, limits: &Limits) -> CoreResult<()> {
    if places == 0 || places > limits.max_places {
        return Err(CoreError::validation(
            "places",
            format!("must be between 1 and {}", limits.max_places),
        ));
    }
    Ok(())
}

fn check_questions(questions: &[String], limits: &Limits) -> CoreResult<Vec<String>> {
    if questions.len() > limits.max_questions {
        return Err(CoreError::validation(
            "questions",
            format!("at most {} questions", limits.max_questions),
        ));
    }
    questions
        .iter()
        .map(|q| {
            validate_required_text("questions", q, limits.max_question_chars)
                .map_err(CoreError::from)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Accolades
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccoladeDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub emoji: String,
    /// Challenge to scope the accolade to; event-wide when absent.
    #[serde(default)]
    pub challenge: Option<String>,
}

impl AccoladeDraft {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        Ok(Self {
            name: validate_name("name", &self.name)?,
            description: validate_text(
                "description",
                &self.description,
                limits.max_description_chars,
            )?,
            emoji: validate_emoji(&self.emoji)?,
            challenge: self
                .challenge
                .as_deref()
                .map(|c| validate_name("challenge", c))
                .transpose()?,
        })
    }
}

/// Change to an accolade's (or submission's) challenge scope.
///
/// On the wire this is a string: `"rm"` clears the scope, anything else
/// names the new challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScopeChange {
    Clear,
    Challenge(String),
}

/// Wire value meaning "remove the challenge scope".
pub const CLEAR_SCOPE: &str = "rm";

impl From<String> for ScopeChange {
    fn from(value: String) -> Self {
        if value == CLEAR_SCOPE {
            Self::Clear
        } else {
            Self::Challenge(value)
        }
    }
}

impl From<ScopeChange> for String {
    fn from(change: ScopeChange) -> Self {
        match change {
            ScopeChange::Clear => CLEAR_SCOPE.to_string(),
            ScopeChange::Challenge(name) => name,
        }
    }
}

impl ScopeChange {
    fn validate(self) -> CoreResult<Self> {
        match self {
            Self::Clear => Ok(Self::Clear),
            Self::Challenge(name) => Ok(Self::Challenge(validate_name("challenge", &name)?)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccoladePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub challenge: Option<ScopeChange>,
    /// Challenge the accolade is scoped to now; picks one of several
    /// same-named scoped accolades.
    pub current_challenge: Option<String>,
}

impl AccoladePatch {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(|n| validate_name("name", n)).transpose()?,
            description: self
                .description
                .as_deref()
                .map(|d| validate_text("description", d, limits.max_description_chars))
                .transpose()?,
            emoji: self.emoji.as_deref().map(validate_emoji).transpose()?,
            challenge: self.challenge.map(ScopeChange::validate).transpose()?,
            current_challenge: self
                .current_challenge
                .as_deref()
                .map(|c| validate_name("currentChallenge", c))
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDraft {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub discord_tags: Vec<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub answers: Vec<String>,
}

impl SubmissionDraft {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        Ok(Self {
            name: validate_name("name", &self.name)?,
            tags: check_tags(&self.tags, limits)?,
            links: check_links(&self.links, limits)?,
            discord_tags: check_discord_tags(&self.discord_tags, limits)?,
            challenge: self
                .challenge
                .as_deref()
                .map(|c| validate_name("challenge", c))
                .transpose()?,
            answers: check_answers(&self.answers, limits)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionPatch {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub discord_tags: Option<Vec<String>>,
    pub challenge: Option<ScopeChange>,
    pub answers: Option<Vec<String>>,
}

impl SubmissionPatch {
    pub fn validate(self, limits: &Limits) -> CoreResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(|n| validate_name("name", n)).transpose()?,
            tags: self.tags.as_deref().map(|t| check_tags(t, limits)).transpose()?,
            links: self.links.as_deref().map(|l| check_links(l, limits)).transpose()?,
            discord_tags: self
                .discord_tags
                .as_deref()
                .map(|d| check_discord_tags(d, limits))
                .transpose()?,
            challenge: self.challenge.map(ScopeChange::validate).transpose()?,
            answers: self
                .answers
                .as_deref()
                .map(|a| check_answers(a, limits))
                .transpose()?,
        })
    }
}

fn check_tags(tags: &[String], limits: &Limits) -> CoreResult<Vec<String>> {
    if tags.len() > limits.max_tags {
        return Err(CoreError::validation("tags", format!("at most {} tags", limits.max_tags)));
    }
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = validate_required_text("tags", tag, limits.max_tag_chars)?;
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

fn check_links(links: &[String], limits: &Limits) -> CoreResult<Vec<String>> {
    if links.len() > limits.max_links {
        return Err(CoreError::validation("links", format!("at most {} links", limits.max_links)));
    }
    links
        .iter()
        .map(|link| {
            let link = link.trim();
            if link.len() > limits.max_link_chars {
                return Err(CoreError::validation(
                    "links",
                    format!("must be at most {} characters", limits.max_link_chars),
                ));
            }
            if !is_http_url(link) {
                return Err(CoreError::validation("links", format!("{link:?} is not an http(s) URL")));
            }
            Ok(link.to_string())
        })
        .collect()
}

fn is_http_url(link: &str) -> bool {
    if link.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match Url::parse(link) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

fn check_discord_tags(tags: &[String], limits: &Limits) -> CoreResult<Vec<String>> {
    if tags.is_empty() || tags.len() > limits.max_authors {
        return Err(CoreError::validation(
            "discordTags",
            format!("must list between 1 and {} authors", limits.max_authors),
        ));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = validate_name("discordTags", tag)?;
        if !seen.insert(tag.clone()) {
            return Err(CoreError::validation("discordTags", format!("{tag:?} listed twice")));
        }
        out.push(tag);
    }
    Ok(out)
}

fn check_answers(answers: &[String], limits: &Limits) -> CoreResult<Vec<String>> {
    if answers.len() > limits.max_questions {
        return Err(CoreError::validation(
            "answers",
            format!("at most {} answers", limits.max_questions),
        ));
    }
    answers
        .iter()
        .map(|a| validate_text("answers", a, limits.max_answer_chars).map_err(CoreError::from))
        .collect()
}

/// Answers may not outnumber the challenge's questions.
pub fn check_answer_count(answers: &[String], questions: usize) -> CoreResult<()> {
    if answers.len() > questions {
        return Err(CoreError::validation(
            "answers",
            format!("{} answers for {questions} questions", answers.len()),
        ));
    }
    Ok(())
}

/// Validate a comment body.
pub fn validate_comment(message: &str, limits: &Limits) -> CoreResult<String> {
    Ok(validate_required_text("message", message, limits.max_comment_chars)?)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// A file handed to the asset lifecycle manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// Original file name; only its extension is used.
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
