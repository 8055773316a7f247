//! Post text validation

use super::validation::{check_length, ValidationError};

/// Maximum length for post text, in characters
pub const MAX_POST_LEN: usize = 280;

/// Validated post body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostText(String);

impl PostText {
    /// Surrounding whitespace counts toward the limit; whitespace-only text is empty.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field: "text" });
        }
        check_length("text", s, 1, MAX_POST_LEN)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
