//! Stateless session tokens.
//!
//! A session is an HS256-signed JWT carrying the account id and role. The
//! server keeps no session table: verification is signature + expiry only,
//! so a token stays valid until it expires.
//!
//! # Security model
//!
//! - The signing secret never leaves this type.
//! - Tokens expire after [`SESSION_TTL_DAYS`] days.
//! - Every token carries a random `jti`. Nothing consults it yet; a
//!   deny-list keyed on `jti` would add revocation before expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::account::{PublicAccount, Role};
use crate::error::TabloError;

/// Lifetime of a freshly issued session.
pub const SESSION_TTL_DAYS: i64 = 30;

/// The verified identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub account_id: i64,
    pub role: Role,
}

impl Session {
    /// Succeeds only for owners.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Forbidden`] for any other role.
    pub fn require_owner(&self) -> Result<(), TabloError> {
        match self.role {
            Role::Owner => Ok(()),
            Role::Tester => Err(TabloError::Forbidden {
                reason: "owner role required".to_owned(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: i64,
    role: Role,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Issues and verifies session tokens.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Create an issuer signing with `secret` and the standard 30-day expiry.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, Duration::days(SESSION_TTL_DAYS))
    }

    /// Create an issuer with a custom token lifetime.
    #[must_use]
    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Create an issuer with a random per-process secret. Tokens it issues
    /// do not survive a restart.
    #[must_use]
    pub fn with_random_secret() -> Self {
        // Two UUID v4s = 32 bytes of OS CSPRNG randomness.
        let mut secret = Vec::with_capacity(32);
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self::new(&secret)
    }

    /// Sign a session token for the given account.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Internal`] if signing fails.
    pub fn issue(&self, account: &PublicAccount) -> Result<String, TabloError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: account.id,
            role: account.role,
            iat: unix_seconds(now.timestamp()),
            exp: unix_seconds((now + self.ttl).timestamp()),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TabloError::internal(format!("failed to sign session: {e}")))
    }

    /// Verify a token's signature and expiry and return its session.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::InvalidToken`] if the token is malformed,
    /// signed with another key, or expired.
    pub fn verify(&self, token: &str) -> Result<Session, TabloError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| TabloError::InvalidToken {
                reason: e.to_string(),
            })?;
        Ok(Session {
            account_id: data.claims.user_id,
            role: data.claims.role,
        })
    }
}

fn unix_seconds(timestamp: i64) -> u64 {
    u64::try_from(timestamp).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(role: Role) -> PublicAccount {
        PublicAccount {
            id: 42,
            identity: "a@x.com".to_owned(),
            display_name: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let issuer = SessionIssuer::new(b"test-secret");
        let token = issuer.issue(&account(Role::Owner)).unwrap();
        let session = issuer.verify(&token).unwrap();
        assert_eq!(
            session,
            Session {
                account_id: 42,
                role: Role::Owner
            }
        );
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let ours = SessionIssuer::new(b"ours");
        let theirs = SessionIssuer::new(b"theirs");
        let token = theirs.issue(&account(Role::Owner)).unwrap();
        assert!(matches!(
            ours.verify(&token),
            Err(TabloError::InvalidToken { .. })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = SessionIssuer::with_ttl(b"secret", Duration::hours(-1));
        let token = issuer.issue(&account(Role::Tester)).unwrap();
        assert!(matches!(
            issuer.verify(&token),
            Err(TabloError::InvalidToken { .. })
        ));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let issuer = SessionIssuer::new(b"secret");
        for token in ["", "abc", "a.b.c"] {
            assert!(issuer.verify(token).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = SessionIssuer::new(b"secret");
        let token = issuer.issue(&account(Role::Tester)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = {
            let owner_token = SessionIssuer::new(b"other").issue(&account(Role::Owner)).unwrap();
            owner_token.split('.').nth(1).unwrap().to_owned()
        };
        parts[1] = &forged_payload;
        assert!(issuer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn random_secrets_differ() {
        let a = SessionIssuer::with_random_secret();
        let b = SessionIssuer::with_random_secret();
        let token = a.issue(&account(Role::Owner)).unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
