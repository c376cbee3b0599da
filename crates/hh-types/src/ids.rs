use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declares an opaque string identifier newtype.
///
/// Identifiers are stored as document `_id` values, so the wire form is the
/// bare string (`#[serde(transparent)]`).
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Parse a caller-supplied identifier, rejecting empty input.
            pub fn parse(raw: &str) -> Result<Self, TypeError> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(TypeError::EmptyId);
                }
                Ok(Self(trimmed.to_string()))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Short representation (first 8 characters).
            pub fn short_id(&self) -> &str {
                let end = self
                    .0
                    .char_indices()
                    .nth(8)
                    .map(|(i, _)| i)
                    .unwrap_or(self.0.len());
                &self.0[..end]
            }

            /// Consume into the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(id: $name) -> Self {
                serde_json::Value::String(id.0)
            }
        }

        impl From<&$name> for serde_json::Value {
            fn from(id: &$name) -> Self {
                serde_json::Value::String(id.0.clone())
            }
        }
    };
}

/// Declares a generated identifier: `new()` yields a fresh UUID v7.
macro_rules! define_generated_id {
    ($(#[$meta:meta])* $name:ident) => {
        define_id!($(#[$meta])* $name);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_generated_id!(
    /// Identifier of an [`Event`](crate::Event).
    EventId
);
define_generated_id!(
    /// Identifier of a [`Challenge`](crate::Challenge).
    ChallengeId
);
define_generated_id!(
    /// Identifier of an [`Accolade`](crate::Accolade).
    AccoladeId
);
define_generated_id!(
    /// Identifier of a [`Submission`](crate::Submission).
    SubmissionId
);
define_generated_id!(
    /// Identifier of a [`Like`](crate::Like).
    LikeId
);
define_generated_id!(
    /// Identifier of a [`Comment`](crate::Comment).
    CommentId
);
define_generated_id!(
    /// Identifier of a [`UserSubmissionLink`](crate::UserSubmissionLink).
    UserLinkId
);
define_id!(
    /// Stable account id issued by the external identity service.
    AccountId
);
