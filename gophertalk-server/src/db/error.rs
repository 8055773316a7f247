//! Store-level error kinds
//!
//! Every backend maps its native failures onto these variants so the HTTP
//! layer can tell a constraint violation from a lost connection.

use std::time::Duration;

use sqlx::error::ErrorKind;

/// Postgres SQLSTATE for `statement_timeout` / query cancellation.
const QUERY_CANCELED: &str = "57014";

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// No pooled connection became free within the acquisition ceiling.
    #[error("timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    /// The datastore could not be reached or the connection dropped.
    #[error("datastore unreachable: {0}")]
    Connectivity(String),

    #[error("datastore operation timed out")]
    Timeout,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("invalid datastore configuration: {0}")]
    Configuration(String),

    #[error("query failed: {0}")]
    Query(String),

    /// The task running a pooled operation panicked or was aborted.
    #[error("pooled operation aborted: {0}")]
    Aborted(String),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Conditions a caller may retry after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolTimeout(_) | Self::Timeout)
    }

    /// Failures after which a connection must not be handed out again.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Timeout)
    }

    /// Infrastructure failures the client sees as "service unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::PoolTimeout(_) | Self::PoolClosed | Self::Connectivity(_) | Self::Timeout
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource: "row",
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(e) => Self::Connectivity(e.to_string()),
            sqlx::Error::Tls(e) => Self::Connectivity(e.to_string()),
            sqlx::Error::Protocol(msg) => Self::Connectivity(msg),
            sqlx::Error::WorkerCrashed => Self::Connectivity("connection worker crashed".into()),
            sqlx::Error::Configuration(e) => Self::Configuration(e.to_string()),
            sqlx::Error::Database(db) => {
                let constraint = db.constraint().unwrap_or_default().to_owned();
                match db.kind() {
                    ErrorKind::UniqueViolation => Self::UniqueViolation { constraint },
                    ErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation { constraint },
                    _ if db.code().as_deref() == Some(QUERY_CANCELED) => Self::Timeout,
                    _ => Self::Query(db.message().to_owned()),
                }
            }
            other => Self::Query(other.to_string()),
        }
    }
}
