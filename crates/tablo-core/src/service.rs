//! Registration, login, and owner-only account administration.
//!
//! The very first account ever created becomes [`Role::Owner`]; every later
//! self-registration is a [`Role::Tester`]. The count-then-insert runs under
//! an in-process creation lock so two concurrent first registrations cannot
//! both observe an empty table.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::account::{CredentialStore, PublicAccount, Role};
use crate::document::encode_batch;
use crate::error::TabloError;
use crate::password;
use crate::section::default_documents;
use crate::session::{Session, SessionIssuer};

/// Shortest secret accepted at registration and admin creation.
pub const MIN_SECRET_LEN: usize = 4;

/// A signed-in account and its session token.
#[derive(Debug, Clone, Serialize)]
pub struct Authenticated {
    pub token: String,
    #[serde(rename = "user")]
    pub account: PublicAccount,
}

/// Fields for a new account. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registration<'a> {
    pub identity: &'a str,
    pub secret: &'a str,
    pub display_name: &'a str,
}

impl Registration<'_> {
    fn validate(&self) -> Result<(), TabloError> {
        if self.identity.is_empty() {
            return Err(TabloError::MissingField { field: "email" });
        }
        if self.secret.is_empty() {
            return Err(TabloError::MissingField { field: "password" });
        }
        if self.secret.chars().count() < MIN_SECRET_LEN {
            return Err(TabloError::WeakSecret {
                min_len: MIN_SECRET_LEN,
            });
        }
        Ok(())
    }
}

/// Account lifecycle operations.
pub struct AccountService {
    credentials: CredentialStore,
    sessions: Arc<SessionIssuer>,
    creation_lock: Mutex<()>,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

impl AccountService {
    #[must_use]
    pub fn new(credentials: CredentialStore, sessions: Arc<SessionIssuer>) -> Self {
        Self {
            credentials,
            sessions,
            creation_lock: Mutex::new(()),
        }
    }

    /// Self-register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// - [`TabloError::MissingField`] / [`TabloError::WeakSecret`] on bad input.
    /// - [`TabloError::DuplicateIdentity`] if the identity is taken.
    /// - [`TabloError::Storage`] / [`TabloError::Internal`] on backend or
    ///   primitive failure.
    pub async fn register(&self, input: Registration<'_>) -> Result<Authenticated, TabloError> {
        let account = self.create_account(input, None).await?;
        let token = self.sessions.issue(&account)?;
        Ok(Authenticated { token, account })
    }

    /// Sign in with identity and secret.
    ///
    /// # Errors
    ///
    /// - [`TabloError::MissingField`] if either field is empty.
    /// - [`TabloError::InvalidCredentials`] for an unknown identity or a
    ///   wrong secret, without saying which.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<Authenticated, TabloError> {
        if identity.is_empty() {
            return Err(TabloError::MissingField { field: "email" });
        }
        if secret.is_empty() {
            return Err(TabloError::MissingField { field: "password" });
        }

        let Some(account) = self.credentials.find_by_identity(identity).await? else {
            password::verify(secret.to_owned(), password::DUMMY_HASH.to_owned()).await?;
            return Err(TabloError::InvalidCredentials);
        };
        if !password::verify(secret.to_owned(), account.secret_hash.clone()).await? {
            return Err(TabloError::InvalidCredentials);
        }

        let account = PublicAccount::from(account);
        let token = self.sessions.issue(&account)?;
        info!(account_id = account.id, "account signed in");
        Ok(Authenticated { token, account })
    }

    /// The caller's own account.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::NotFound`] if the account was deleted after the
    /// session was issued.
    pub async fn get_self(&self, account_id: i64) -> Result<PublicAccount, TabloError> {
        self.credentials
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| TabloError::not_found(format!("account {account_id}")))
    }

    /// List every account. Owner only.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Forbidden`] unless the caller is an owner.
    pub async fn admin_list(&self, caller: &Session) -> Result<Vec<PublicAccount>, TabloError> {
        caller.require_owner()?;
        self.credentials.list().await
    }

    /// Create an account with an explicit role (default tester). Owner only.
    /// No session is issued for the new account.
    ///
    /// # Errors
    ///
    /// [`TabloError::Forbidden`] unless the caller is an owner, then the same
    /// errors as [`register`](Self::register).
    pub async fn admin_create(
        &self,
        caller: &Session,
        input: Registration<'_>,
        role: Option<Role>,
    ) -> Result<PublicAccount, TabloError> {
        caller.require_owner()?;
        let account = self
            .create_account(input, Some(role.unwrap_or_default()))
            .await?;
        info!(
            caller_id = caller.account_id,
            account_id = account.id,
            "account created by owner"
        );
        Ok(account)
    }

    /// Change an account's display name and/or role. Absent fields keep
    /// their current value. Owner only.
    ///
    /// # Errors
    ///
    /// - [`TabloError::Forbidden`] unless the caller is an owner.
    /// - [`TabloError::NotFound`] if the target does not exist.
    pub async fn admin_update(
        &self,
        caller: &Session,
        target_id: i64,
        display_name: Option<&str>,
        role: Option<Role>,
    ) -> Result<PublicAccount, TabloError> {
        caller.require_owner()?;
        let current = self.get_self(target_id).await?;
        let display_name = display_name.unwrap_or(&current.display_name);
        let role = role.unwrap_or(current.role);
        self.credentials.update(target_id, display_name, role).await?;
        info!(
            caller_id = caller.account_id,
            account_id = target_id,
            %role,
            "account updated by owner"
        );
        self.get_self(target_id).await
    }

    /// Delete another account and all of its documents. Owner only.
    ///
    /// # Errors
    ///
    /// - [`TabloError::Forbidden`] unless the caller is an owner.
    /// - [`TabloError::SelfDeletion`] if the target is the caller.
    /// - [`TabloError::NotFound`] if the target does not exist.
    pub async fn admin_delete(&self, caller: &Session, target_id: i64) -> Result<(), TabloError> {
        caller.require_owner()?;
        if target_id == caller.account_id {
            return Err(TabloError::SelfDeletion);
        }
        if !self.credentials.delete(target_id).await? {
            return Err(TabloError::not_found(format!("account {target_id}")));
        }
        info!(
            caller_id = caller.account_id,
            account_id = target_id,
            "account deleted"
        );
        Ok(())
    }

    /// Validate, hash, then insert with the default document set. `role`
    /// of `None` applies the bootstrap rule.
    async fn create_account(
        &self,
        input: Registration<'_>,
        role: Option<Role>,
    ) -> Result<PublicAccount, TabloError> {
        input.validate()?;
        let secret_hash = password::hash(input.secret.to_owned()).await?;
        let seed = encode_batch(&default_documents())?;

        let _guard = self.creation_lock.lock().await;
        let role = match role {
            Some(role) => role,
            None if self.credentials.count().await? == 0 => Role::Owner,
            None => Role::Tester,
        };
        let account = self
            .credentials
            .create(
                input.identity,
                &secret_hash,
                input.display_name,
                role,
                &seed,
            )
            .await?;
        info!(account_id = account.id, %role, "account created");
        Ok(PublicAccount::from(account))
    }
}
