//! Secret hashing.
//!
//! Secrets are hashed with Argon2id (default parameters) into PHC strings.
//! Verification goes through `argon2`'s own comparison, which is constant
//! time. Hashing is CPU-bound, so the async wrappers run it on the blocking
//! thread pool.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::TabloError;

/// Well-formed Argon2id hash with the default parameters that no secret is
/// known to match. Checked against when an identity is unknown so that
/// lookup misses cost the same as wrong secrets.
pub const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$GUPCCm+g/zeyAPCi0SpiDw$Wo03wopdx4MeFI/AIv9sbG75scCkHyx7zYtC7Oyfqs4";

/// Hash a secret into a PHC-format string.
///
/// # Errors
///
/// Returns [`TabloError::Internal`] if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String, TabloError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TabloError::internal(format!("failed to hash secret: {e}")))
}

/// Check a secret against a stored hash. A malformed hash never matches.
#[must_use]
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_secret`] on the blocking pool.
///
/// # Errors
///
/// Returns [`TabloError::Internal`] if hashing fails or the task panics.
pub async fn hash(secret: String) -> Result<String, TabloError> {
    tokio::task::spawn_blocking(move || hash_secret(&secret))
        .await
        .map_err(|e| TabloError::internal(format!("blocking task panicked: {e}")))?
}

/// [`verify_secret`] on the blocking pool.
///
/// # Errors
///
/// Returns [`TabloError::Internal`] if the task panics.
pub async fn verify(secret: String, hash: String) -> Result<bool, TabloError> {
    tokio::task::spawn_blocking(move || verify_secret(&secret, &hash))
        .await
        .map_err(|e| TabloError::internal(format!("blocking task panicked: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_secret() {
        let hash = hash_secret("pass1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("pass1", &hash));
        assert!(!verify_secret("pass2", &hash));
    }

    #[test]
    fn same_secret_hashes_differently() {
        assert_ne!(hash_secret("pass1").unwrap(), hash_secret("pass1").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_secret("pass1", "not-a-phc-string"));
        assert!(!verify_secret("", ""));
    }

    #[test]
    fn dummy_hash_parses_with_default_cost() {
        let parsed = PasswordHash::new(DUMMY_HASH).unwrap();
        let params = argon2::Params::try_from(&parsed).unwrap();
        let defaults = argon2::Params::default();
        assert_eq!(parsed.algorithm, argon2::Algorithm::Argon2id.ident());
        assert_eq!(params.m_cost(), defaults.m_cost());
        assert_eq!(params.t_cost(), defaults.t_cost());
        assert_eq!(params.p_cost(), defaults.p_cost());
        assert!(!verify_secret("pass1", DUMMY_HASH));
    }

    #[tokio::test]
    async fn async_wrappers_agree() {
        let hash = hash("secret".to_owned()).await.unwrap();
        assert!(verify("secret".to_owned(), hash.clone()).await.unwrap());
        assert!(!verify("wrong".to_owned(), hash).await.unwrap());
    }
}
