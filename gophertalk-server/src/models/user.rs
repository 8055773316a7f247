//! User profile field validation
//!
//! Rules:
//! - user name: 5-30 chars, ASCII letters/digits/underscore, starts with a letter
//! - password: 5-30 chars with at least one letter, one digit and one of `@$!%*?&`
//! - first/last name: 1-30 letters in any script

use once_cell::sync::Lazy;
use regex::Regex;

use super::validation::{check_length, ValidationError};

const USER_NAME_MIN: usize = 5;
const USER_NAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 5;
const PASSWORD_MAX: usize = 30;
const PERSON_NAME_MAX: usize = 30;

/// Special characters a password must draw at least one from.
const PASSWORD_SPECIALS: &str = "@$!%*?&";

static USER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("invalid user name regex"));

static PERSON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{L}+$").expect("invalid person name regex"));

/// Validated, unique login name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserName(String);

impl UserName {
    /// # Example
    /// ```
    /// use gophertalk_server::models::UserName;
    ///
    /// assert!(UserName::new("gopher_42").is_ok());
    /// assert!(UserName::new("42gopher").is_err()); // starts with a digit
    /// assert!(UserName::new("go-pher").is_err());  // dash
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        check_length("user_name", s, USER_NAME_MIN, USER_NAME_MAX)?;
        if !USER_NAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "user_name",
                reason: "must be letters, digits or underscore and start with a letter",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Plaintext password that satisfies the strength rules. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::with_field("password", s)
    }

    pub(crate) fn with_field(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        check_length(field, s, PASSWORD_MIN, PASSWORD_MAX)?;

        let has_letter = s.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = s.chars().any(|c| c.is_ascii_digit());
        let has_special = s.chars().any(|c| PASSWORD_SPECIALS.contains(c));
        if !(has_letter && has_digit && has_special) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must contain a letter, a number and one of @$!%*?&",
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Validate a password together with its confirmation.
    pub fn confirmed(password: &str, confirm: &str) -> Result<Self, ValidationError> {
        let password = Self::new(password)?;
        Self::with_field("password_confirm", confirm)?;
        if password.0 != confirm {
            return Err(ValidationError::Mismatch {
                field: "password_confirm",
                other: "password",
            });
        }
        Ok(password)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// First or last name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        check_length(field, s, 1, PERSON_NAME_MAX)?;
        if !PERSON_NAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "only letters allowed",
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Validate an optional field, passing `None` through.
    pub fn optional(field: &'static str, s: Option<&str>) -> Result<Option<Self>, ValidationError> {
        s.map(|s| Self::new(field, s)).transpose()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
