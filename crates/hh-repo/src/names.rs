//! Field-level validation for names and free text.
//!
//! Valid names:
//! - Must be non-empty after trimming surrounding whitespace
//! - Must be at most [`MAX_NAME_CHARS`] characters
//! - Must not contain control characters (tabs, newlines, NUL, ...)
//!
//! Validators return the normalized (trimmed) value so callers store exactly
//! what was checked.

use crate::error::{RepoError, Result};

/// Longest accepted entity name, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Longest accepted emoji string, in characters.
pub const MAX_EMOJI_CHARS: usize = 16;

/// Validate an entity name, returning the trimmed value.
///
/// # Examples
///
/// ```
/// use hh_repo::names::validate_name;
///
/// assert_eq!(validate_name("name", "  Hack1 ").unwrap(), "Hack1");
/// assert!(validate_name("name", "").is_err());
/// assert!(validate_name("name", "bad\tname").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RepoError::invalid(field, "must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(RepoError::invalid(
            field,
            format!("must be at most {MAX_NAME_CHARS} characters (got {len})"),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(RepoError::invalid(field, "must not contain control characters"));
    }
    Ok(trimmed.to_string())
}

/// Validate free text bounded by `max_chars`; empty text is allowed.
///
/// Newlines and tabs are permitted; other control characters are not.
pub fn validate_text(field: &str, text: &str, max_chars: usize) -> Result<String> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(RepoError::invalid(
            field,
            format!("must be at most {max_chars} characters (got {len})"),
        ));
    }
    if trimmed
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(RepoError::invalid(field, "must not contain control characters"));
    }
    Ok(trimmed.to_string())
}

/// Validate required free text: like [`validate_text`] but non-empty.
pub fn validate_required_text(field: &str, text: &str, max_chars: usize) -> Result<String> {
    let value = validate_text(field, text, max_chars)?;
    if value.is_empty() {
        return Err(RepoError::invalid(field, "must not be empty"));
    }
    Ok(value)
}

/// Validate an accolade emoji.
pub fn validate_emoji(emoji: &str) -> Result<String> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() {
        return Err(RepoError::invalid("emoji", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_EMOJI_CHARS {
        return Err(RepoError::invalid(
            "emoji",
            format!("must be at most {MAX_EMOJI_CHARS} characters"),
        ));
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(RepoError::invalid("emoji", "must not contain whitespace"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_names() {
        for name in ["Hack1", "Best UI", "Ünïcödé", "a", "🏆 Winner"] {
            assert!(validate_name("name", name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_name("name", "  Best UI\n").unwrap(), "Best UI");
    }

    #[test]
    fn invalid_names() {
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", "tab\there").is_err());
        assert!(validate_name("name", "nul\0").is_err());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn error_names_the_field() {
        let err = validate_name("challenge", "").unwrap_err();
        assert!(err.to_string().contains("challenge"));
    }

    #[test]
    fn text_bounds() {
        assert_eq!(validate_text("description", "", 10).unwrap(), "");
        assert_eq!(validate_text("description", "line\nline", 20).unwrap(), "line\nline");
        assert!(validate_text("description", "0123456789ab", 10).is_err());
        assert!(validate_text("description", "bell\u{7}", 10).is_err());
        assert!(validate_required_text("message", "  ", 10).is_err());
    }

    #[test]
    fn emoji_rules() {
        assert_eq!(validate_emoji(" 🏆 ").unwrap(), "🏆");
        assert!(validate_emoji("").is_err());
        assert!(validate_emoji("🏆 🥇").is_err());
        assert!(validate_emoji(&"🏆".repeat(MAX_EMOJI_CHARS + 1)).is_err());
    }

    proptest! {
        #[test]
        fn accepted_names_are_trimmed_and_bounded(name in "\\PC{0,80}") {
            if let Ok(v) = validate_name("name", &name) {
                prop_assert_eq!(v.trim(), v.as_str());
                prop_assert!(!v.is_empty());
                prop_assert!(v.chars().count() <= MAX_NAME_CHARS);
            }
        }
    }
}
