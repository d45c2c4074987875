//! Completion trigger matching.
//!
//! The session cache answers every query it is given; deciding *when* to ask
//! is the editor host's job. [`TriggerMatcher`] is the default policy:
//! complete after member access or scope resolution, or once an identifier
//! prefix is long enough to narrow the list.

use regex::Regex;
use thiserror::Error;

/// Member access (`.`, `->`) or scope resolution (`::`) at the end of the text.
pub const DEFAULT_TRIGGER: &str = r"((::)|(\.)|(->))$";

/// Identifier prefix length that triggers completion when no pattern matches.
pub const DEFAULT_MIN_WORD_LEN: usize = 3;

/// Invalid trigger configuration.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The trigger pattern is not a valid regular expression.
    #[error("invalid completion trigger `{pattern}`: {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Regex compile error.
        #[source]
        source: regex::Error,
    },
}

/// Decides whether the text before the cursor should start a completion query.
#[derive(Debug, Clone)]
pub struct TriggerMatcher {
    pattern: Regex,
    min_word_len: usize,
}

impl TriggerMatcher {
    /// Builds a matcher from a pattern and a minimum identifier prefix length.
    ///
    /// A `min_word_len` of 0 disables the identifier rule.
    pub fn new(pattern: &str, min_word_len: usize) -> Result<Self, TriggerError> {
        let pattern = Regex::new(pattern).map_err(|source| TriggerError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            min_word_len,
        })
    }

    /// Returns the trigger pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the identifier prefix length rule (0 when disabled).
    #[must_use]
    pub fn min_word_len(&self) -> usize {
        self.min_word_len
    }

    /// Returns true if `before_cursor` (the line up to the cursor) should
    /// trigger a completion query.
    #[must_use]
    pub fn should_complete(&self, before_cursor: &str) -> bool {
        if self.pattern.is_match(before_cursor) {
            return true;
        }
        self.min_word_len > 0 && identifier_prefix(before_cursor).len() >= self.min_word_len
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER, DEFAULT_MIN_WORD_LEN).expect("default trigger pattern compiles")
    }
}

/// Returns the identifier characters immediately before the end of `text`.
///
/// A run starting with a digit is a number literal, not an identifier.
#[must_use]
pub fn identifier_prefix(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_alphanumeric() || *ch == '_')
        .last()
        .map_or(text.len(), |(index, _)| index);
    let prefix = &text[start..];
    if prefix.starts_with(|ch: char| ch.is_ascii_digit()) {
        return "";
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_matches_member_access_and_scope() {
        let trigger = TriggerMatcher::default();
        assert!(trigger.should_complete("  person."));
        assert!(trigger.should_complete("  ptr->"));
        assert!(trigger.should_complete("std::"));
        assert!(!trigger.should_complete("a - "));
        assert!(!trigger.should_complete("x >"));
        assert!(!trigger.should_complete("ptr-"));
        assert!(!trigger.should_complete("std:"));
        assert!(!trigger.should_complete(""));
    }

    #[test]
    fn identifier_prefix_rule() {
        let trigger = TriggerMatcher::default();
        assert!(!trigger.should_complete("  pu"));
        assert!(trigger.should_complete("  pus"));
        assert!(trigger.should_complete("v.push_b"));
        assert!(!trigger.should_complete("x = 1234"));

        let strict = TriggerMatcher::new(DEFAULT_TRIGGER, 0).expect("valid pattern");
        assert!(!strict.should_complete("  push_back"));
        assert!(strict.should_complete("v."));
    }

    #[test]
    fn custom_patterns() {
        let trigger = TriggerMatcher::new(r"#include\s*[<\x22]$", 0).expect("valid pattern");
        assert!(trigger.should_complete("#include <"));
        assert!(!trigger.should_complete("p."));
        assert_eq!(trigger.pattern(), r"#include\s*[<\x22]$");
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = TriggerMatcher::new("((", 3).expect_err("unbalanced group");
        assert!(err.to_string().starts_with("invalid completion trigger `((`"));
    }

    #[test]
    fn prefix_stops_at_non_identifier() {
        assert_eq!(identifier_prefix("a->size"), "size");
        assert_eq!(identifier_prefix("x_1"), "x_1");
        assert_eq!(identifier_prefix("f(9"), "");
        assert_eq!(identifier_prefix("f( "), "");
    }
}
