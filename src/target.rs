//! Target digit sequences.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// "Please select all boxes with number 472" and similar wording.
static SELECT_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)select.*?(\d+)").unwrap());

/// Any bare 3-4 digit number.
static BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3,4})").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,

    #[error("target must contain only digits, got {0:?}")]
    NotDigits(String),
}

/// The digit string a challenge asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Validate and wrap a target. Surrounding whitespace is ignored.
    pub fn new(value: impl AsRef<str>) -> Result<Self, TargetError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(TargetError::Empty);
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TargetError::NotDigits(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pull the target number out of challenge instruction text.
///
/// Tries "select ... <digits>" first, then any 3-4 digit number.
pub fn extract_target(text: &str) -> Option<Target> {
    SELECT_PHRASE
        .captures(text)
        .or_else(|| BARE_NUMBER.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| Target::new(m.as_str()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_validation() {
        assert_eq!(Target::new(" 47 ").unwrap().as_str(), "47");
        assert_eq!(Target::new(""), Err(TargetError::Empty));
        assert_eq!(Target::new("   "), Err(TargetError::Empty));
        assert!(matches!(Target::new("4x7"), Err(TargetError::NotDigits(_))));
    }

    #[test]
    fn test_extract_from_select_phrase() {
        let target = extract_target("Please SELECT all boxes with number 47").unwrap();
        assert_eq!(target.as_str(), "47");
    }

    #[test]
    fn test_extract_falls_back_to_bare_number() {
        let target = extract_target("Boxes containing 3821 only").unwrap();
        assert_eq!(target.as_str(), "3821");
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_target("Pick the boxes with cats"), None);
        assert_eq!(extract_target("only 12 here"), None);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let target = Target::new("47").unwrap();
        assert_eq!(serde_json::to_string(&target).unwrap(), "\"47\"");
    }
}
