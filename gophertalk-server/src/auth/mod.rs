//! Identity: token issuance/verification and password hashing
//!
//! Verification is pure computation over the token and the signing secret;
//! nothing here touches the datastore.

pub mod password;
pub mod token;

pub use password::{hash_password, reject_unknown_user, verify_password};
pub use token::{Claims, TokenKind, TokenPair, TokenService, MAX_TOKEN_TTL};

/// Identity failures; client-side ones surface as 401, server-side ones as 500
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    /// A refresh token presented as an access token, or the reverse.
    #[error("expected a {expected} token")]
    WrongKind { expected: TokenKind },

    #[error("invalid user name or password")]
    InvalidCredentials,

    /// Hashing itself failed; a server-side defect rather than a client error.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Token could not be produced; also a server-side defect.
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Short machine-readable token for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::MalformedHeader => "malformed_header",
            Self::InvalidToken => "invalid_token",
            Self::Expired => "token_expired",
            Self::WrongKind { .. } => "wrong_token_kind",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Hashing(_) | Self::Signing(_) => "internal_error",
        }
    }
}
