use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Name of the primary key field on every document.
pub const ID_FIELD: &str = "_id";

/// A named collection; every entity kind maps to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Events,
    Challenges,
    Accolades,
    Submissions,
    Likes,
    Comments,
    UserSubmissionLinks,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Events,
        Collection::Challenges,
        Collection::Accolades,
        Collection::Submissions,
        Collection::Likes,
        Collection::Comments,
        Collection::UserSubmissionLinks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Challenges => "challenges",
            Self::Accolades => "accolades",
            Self::Submissions => "submissions",
            Self::Likes => "likes",
            Self::Comments => "comments",
            Self::UserSubmissionLinks => "userSubmissionLinks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Clause {
    Eq(String, Value),
    OneOf(String, Vec<Value>),
}

/// Conjunction of equality / membership clauses on top-level fields.
///
/// Matching follows document-database conventions: when the document field
/// is an array, an equality clause matches if the array contains the value;
/// a `null` clause value matches a missing or `null` field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the document with the given `_id`.
    pub fn id(id: impl Into<Value>) -> Self {
        Self::all().eq(ID_FIELD, id)
    }

    /// Add an equality clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    /// Add a clause matching when the field equals (or contains) any value.
    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.clauses.push(Clause::OneOf(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Add a clause matching a missing or `null` field.
    pub fn missing(self, field: impl Into<String>) -> Self {
        self.eq(field, Value::Null)
    }

    /// Whether the filter matches every document.
    pub fn is_all(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, expected) => field_matches(doc.get(field), expected),
            Clause::OneOf(field, candidates) => candidates
                .iter()
                .any(|expected| field_matches(doc.get(field), expected)),
        })
    }
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(_)), Value::Array(_)) => actual == Some(expected),
        (Some(Value::Array(items)), value) => items.contains(value),
        (Some(value), expected) => value == expected,
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// A single-field update operator.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOp {
    /// `$set`: overwrite the field.
    Set(String, Value),
    /// `$unset`: remove the field.
    Unset(String),
    /// `$addToSet`: append to an array field unless already present.
    AddToSet(String, Value),
    /// `$pull`: remove every occurrence of the value from an array field.
    Pull(String, Value),
    /// `$pullAll`: remove every occurrence of each value.
    PullAll(String, Vec<Value>),
}

impl UpdateOp {
    fn field(&self) -> &str {
        match self {
            Self::Set(f, _)
            | Self::Unset(f)
            | Self::AddToSet(f, _)
            | Self::Pull(f, _)
            | Self::PullAll(f, _) => f,
        }
    }
}

/// Ordered list of update operators applied atomically to one document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    /// `$set` when `value` is `Some`, `$unset` otherwise.
    pub fn set_or_unset(self, field: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self.unset(field),
        }
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::AddToSet(field.into(), value.into()));
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(field.into(), value.into()));
        self
    }

    pub fn pull_all<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.ops.push(UpdateOp::PullAll(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check the update before touching any document.
    pub fn validate(&self) -> StoreResult<()> {
        for op in &self.ops {
            if op.field() == ID_FIELD {
                return Err(StoreError::InvalidDocument("cannot modify _id".into()));
            }
            if op.field().is_empty() {
                return Err(StoreError::InvalidDocument("empty field name".into()));
            }
        }
        Ok(())
    }

    /// Apply to a document, returning whether anything changed.
    ///
    /// On error the document is left untouched.
    pub fn apply(&self, doc: &mut Map<String, Value>) -> StoreResult<bool> {
        self.validate()?;
        let mut working = doc.clone();
        let mut modified = false;
        for op in &self.ops {
            modified |= apply_op(&mut working, op)?;
        }
        if modified {
            *doc = working;
        }
        Ok(modified)
    }
}

fn array_field<'a>(
    doc: &'a mut Map<String, Value>,
    field: &str,
) -> StoreResult<&'a mut Vec<Value>> {
    let slot = doc.entry(field.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        other => Err(StoreError::InvalidDocument(format!(
            "field {field} is not an array (found {other})"
        ))),
    }
}

fn apply_op(doc: &mut Map<String, Value>, op: &UpdateOp) -> StoreResult<bool> {
    match op {
        UpdateOp::Set(field, value) => {
            let previous = doc.insert(field.clone(), value.clone());
            Ok(previous.as_ref() != Some(value))
        }
        UpdateOp::Unset(field) => Ok(doc.remove(field).is_some()),
        UpdateOp::AddToSet(field, value) => {
            let items = array_field(doc, field)?;
            if items.contains(value) {
                Ok(false)
            } else {
                items.push(value.clone());
                Ok(true)
            }
        }
        UpdateOp::Pull(field, value) => {
            if doc.get(field).map_or(true, Value::is_null) {
                return Ok(false);
            }
            let items = array_field(doc, field)?;
            let before = items.len();
            items.retain(|item| item != value);
            Ok(items.len() != before)
        }
        UpdateOp::PullAll(field, values) => {
            if doc.get(field).map_or(true, Value::is_null) {
                return Ok(false);
            }
            let items = array_field(doc, field)?;
            let before = items.len();
            items.retain(|item| !values.contains(item));
            Ok(items.len() != before)
        }
    }
}

/// Result of an `update_one` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the filter (0 or 1).
    pub matched: u64,
    /// Number of documents actually changed (0 or 1).
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn is_matched(&self) -> bool {
        self.matched > 0
    }

    pub fn is_modified(&self) -> bool {
        self.modified > 0
    }
}
