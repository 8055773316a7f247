//! Argon2 password hashing
//!
//! Hashing is CPU-bound, so both directions run on the blocking pool.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tokio::sync::OnceCell;

use super::AuthError;

/// Stand-in hash checked when the user name is unknown
static UNKNOWN_USER_HASH: OnceCell<String> = OnceCell::const_new();

/// Hash a password into a PHC string.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// Check a password against a stored PHC string.
///
/// A mismatch and an unparseable stored hash both yield `InvalidCredentials`.
pub async fn verify_password(password: String, stored: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored).map_err(|e| {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            AuthError::InvalidCredentials
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// Spend the same Argon2 work a real check would, then reject.
///
/// Keeps unknown user names from answering measurably faster than wrong
/// passwords.
pub async fn reject_unknown_user(password: String) -> AuthError {
    let stored = match UNKNOWN_USER_HASH
        .get_or_try_init(|| hash_password("unknown-user".into()))
        .await
    {
        Ok(hash) => hash.clone(),
        Err(e) => return e,
    };
    match verify_password(password, stored).await {
        Err(AuthError::Hashing(message)) => AuthError::Hashing(message),
        _ => AuthError::InvalidCredentials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("s3cret!pw".into()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("s3cret!pw"));

        verify_password("s3cret!pw".into(), hash.clone()).await.unwrap();
        assert!(matches!(
            verify_password("wrong1!pw".into(), hash).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn salts_differ() {
        let a = hash_password("same1!pw".into()).await.unwrap();
        let b = hash_password("same1!pw".into()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("whatever1!".into(), "not-a-phc-string".into()).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_after_a_real_verification() {
        assert!(matches!(
            reject_unknown_user("whatever1!".into()).await,
            AuthError::InvalidCredentials
        ));
        let stored = UNKNOWN_USER_HASH.get().cloned().unwrap();
        assert!(stored.starts_with("$argon2"));

        // Even the stand-in's own password never gets through
        assert!(matches!(
            reject_unknown_user("unknown-user".into()).await,
            AuthError::InvalidCredentials
        ));
    }
}
