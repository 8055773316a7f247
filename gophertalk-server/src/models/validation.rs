//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field is shorter than its minimum length
    TooShort { field: &'static str, min: usize },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Number below its allowed minimum
    OutOfRange { field: &'static str, min: i64 },

    /// Two fields that must agree don't
    Mismatch { field: &'static str, other: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::OutOfRange { field, min } => {
                write!(f, "{} must be greater than or equal to {}", field, min)
            }
            Self::Mismatch { field, other } => write!(f, "{} must match {}", field, other),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a character count against inclusive bounds.
pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty { field });
    }
    if len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Validate a positive identifier (path segment, foreign key in a payload).
pub fn positive_id(field: &'static str, value: i64) -> Result<i64, ValidationError> {
    if value < 1 {
        return Err(ValidationError::OutOfRange { field, min: 1 });
    }
    Ok(value)
}
