//! Limit/offset pagination

use serde::Deserialize;

use super::validation::ValidationError;

/// Maximum items per page
pub const MAX_LIMIT: u32 = 100;

/// Default items per page
pub const DEFAULT_LIMIT: u32 = 20;

/// Validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

impl Page {
    /// - `limit` must be at least 1; larger than 100 is clamped to 100
    /// - `offset` must not be negative
    pub fn new(limit: i64, offset: i64) -> Result<Self, ValidationError> {
        if limit < 1 {
            return Err(ValidationError::OutOfRange {
                field: "limit",
                min: 1,
            });
        }
        if offset < 0 {
            return Err(ValidationError::OutOfRange {
                field: "offset",
                min: 0,
            });
        }
        Ok(Self {
            limit: limit.min(MAX_LIMIT as i64) as u32,
            offset: offset as u64,
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TryFrom<PageParams> for Page {
    type Error = ValidationError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        Self::new(
            params.limit.unwrap_or(DEFAULT_LIMIT as i64),
            params.offset.unwrap_or(0),
        )
    }
}
