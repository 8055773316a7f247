//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses `{"error": <kind>, "message": <text>}`.
//! Infrastructure and internal failures are logged in full and answered with
//! a generic message; query text and driver detail never reach the client.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Payload or query failed validation (400)
    Validation(ValidationError),

    /// Request could not be read at all (400)
    BadRequest { message: String },

    /// Identity missing or rejected (401)
    Unauthenticated(AuthError),

    /// Authenticated but not allowed (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Uniqueness conflict (409)
    Conflict { message: String },

    /// Pool exhausted or datastore unreachable (503, logged)
    Unavailable(DbError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard JSON error body.
pub(crate) fn error_body(status: StatusCode, error: &str, message: &str) -> Response {
    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Validation(e) => error_body(status, "validation_error", &e.to_string()),
            Self::BadRequest { message } => error_body(status, "bad_request", message),
            Self::Unauthenticated(e) => error_body(status, e.code(), &e.to_string()),
            Self::Forbidden { reason } => error_body(status, "forbidden", reason),
            Self::NotFound { resource, id } if id.is_empty() => {
                error_body(status, "not_found", &format!("{resource} not found"))
            }
            Self::NotFound { resource, id } => {
                error_body(status, "not_found", &format!("{resource} '{id}' not found"))
            }
            Self::Conflict { message } => error_body(status, "conflict", message),
            Self::Unavailable(e) => {
                tracing::error!(error = %e, "datastore unavailable");
                let mut response = error_body(
                    status,
                    "service_unavailable",
                    "service temporarily unavailable, retry shortly",
                );
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                response
            }
            Self::Internal { message } => {
                // Log the actual error, return generic message
                tracing::error!(error = %message, "internal error");
                error_body(status, "internal_error", "an internal error occurred")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Hashing(message) | AuthError::Signing(message) => {
                Self::Internal { message }
            }
            other => Self::Unauthenticated(other),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::UniqueViolation { .. } => Self::Conflict {
                message: "resource already exists".into(),
            },
            DbError::ForeignKeyViolation { .. } => Self::NotFound {
                resource: "referenced resource",
                id: String::new(),
            },
            e if e.is_unavailable() => Self::Unavailable(e),
            e => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}
