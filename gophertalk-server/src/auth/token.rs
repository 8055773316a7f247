//! HS256 access and refresh tokens

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Upper bound for either token lifetime (ten years)
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub exp: i64,
    pub iat: i64,
    pub kind: TokenKind,
}

/// Response body of register, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with one shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL)
    }

    pub fn with_ttl(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a fresh access/refresh pair for `user_id`.
    pub fn issue(&self, user_id: i64) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign(user_id, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.sign(user_id, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    /// Verify an access token and return its subject.
    pub fn verify_access(&self, token: &str) -> Result<i64, AuthError> {
        self.verify(token, TokenKind::Access).map(|c| c.sub)
    }

    /// Verify a refresh token and return its subject.
    pub fn verify_refresh(&self, token: &str) -> Result<i64, AuthError> {
        self.verify(token, TokenKind::Refresh).map(|c| c.sub)
    }

    fn sign(&self, user_id: i64, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| {
                AuthError::Signing(format!("{kind} token lifetime {ttl:?} is out of range"))
            })?;
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp,
            kind,
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign token");
            AuthError::Signing(e.to_string())
        })
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.kind != expected {
            return Err(AuthError::WrongKind { expected });
        }
        Ok(data.claims)
    }
}
