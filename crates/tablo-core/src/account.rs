//! Accounts and the credential store.
//!
//! [`CredentialStore`] is a typed view over the storage backend's account
//! rows. It converts the backend's plain-text role column into [`Role`] and
//! strips the secret hash from anything that leaves the service layer
//! ([`PublicAccount`]).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablo_storage::{AccountRecord, NewAccount, StorageBackend};

use crate::error::TabloError;

/// Account role. Closed set; authorization matches on it exhaustively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator. The first account ever created gets this role.
    Owner,
    /// Standard account.
    #[default]
    Tester,
}

impl Role {
    /// The role's storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Tester => "tester",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "tester" => Ok(Self::Tester),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A stored account, including its secret hash. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub identity: String,
    pub secret_hash: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account fields that are safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub id: i64,
    #[serde(rename = "email")]
    pub identity: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for PublicAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            identity: a.identity,
            display_name: a.display_name,
            role: a.role,
            created_at: a.created_at,
        }
    }
}

impl TryFrom<AccountRecord> for Account {
    type Error = TabloError;

    fn try_from(r: AccountRecord) -> Result<Self, Self::Error> {
        let role = r.role.parse().map_err(|e| {
            TabloError::internal(format!("account {} has a corrupt role: {e}", r.id))
        })?;
        Ok(Self {
            id: r.id,
            identity: r.identity,
            secret_hash: r.secret_hash,
            display_name: r.display_name,
            role,
            created_at: r.created_at,
        })
    }
}

/// Persists accounts. Identity uniqueness is enforced by the backend.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a credential store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Insert a new account together with its seed documents (already
    /// serialized), atomically.
    ///
    /// # Errors
    ///
    /// - [`TabloError::DuplicateIdentity`] if the identity is taken.
    /// - [`TabloError::Storage`] if the backend fails.
    pub async fn create(
        &self,
        identity: &str,
        secret_hash: &str,
        display_name: &str,
        role: Role,
        seed: &[(String, String)],
    ) -> Result<Account, TabloError> {
        let record = self
            .storage
            .create_account(
                NewAccount {
                    identity,
                    secret_hash,
                    display_name,
                    role: role.as_str(),
                },
                seed,
            )
            .await?;
        Account::try_from(record)
    }

    /// Look up an account by identity, including its secret hash.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>, TabloError> {
        self.storage
            .find_account_by_identity(identity)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    /// Look up an account by id, without its secret hash.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<PublicAccount>, TabloError> {
        self.storage
            .find_account_by_id(id)
            .await?
            .map(|r| Account::try_from(r).map(PublicAccount::from))
            .transpose()
    }

    /// List every account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn list(&self) -> Result<Vec<PublicAccount>, TabloError> {
        self.storage
            .list_accounts()
            .await?
            .into_iter()
            .map(|r| Account::try_from(r).map(PublicAccount::from))
            .collect()
    }

    /// Number of accounts.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn count(&self) -> Result<u64, TabloError> {
        Ok(self.storage.count_accounts().await?)
    }

    /// Replace an account's display name and role.
    ///
    /// # Errors
    ///
    /// - [`TabloError::NotFound`] if no such account exists.
    /// - [`TabloError::Storage`] if the backend fails.
    pub async fn update(&self, id: i64, display_name: &str, role: Role) -> Result<(), TabloError> {
        if self
            .storage
            .update_account(id, display_name, role.as_str())
            .await?
        {
            Ok(())
        } else {
            Err(TabloError::not_found(format!("account {id}")))
        }
    }

    /// Delete an account and all of its documents. Returns `false` if the
    /// account did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn delete(&self, id: i64) -> Result<bool, TabloError> {
        Ok(self.storage.delete_account(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablo_storage::MemoryBackend;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn role_parses_and_displays() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("tester".parse::<Role>(), Ok(Role::Tester));
        assert!("Owner".parse::<Role>().is_err());
        assert_eq!(Role::Owner.to_string(), "owner");
        assert_eq!(Role::default(), Role::Tester);
    }

    #[test]
    fn public_account_serializes_without_hash() {
        let account = Account {
            id: 7,
            identity: "a@x.com".to_owned(),
            secret_hash: "$argon2id$secret".to_owned(),
            display_name: "Alice".to_owned(),
            role: Role::Owner,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(PublicAccount::from(account)).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["role"], "owner");
        assert!(json.get("secret_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = store();
        let created = store
            .create("a@x.com", "hash", "Alice", Role::Owner, &[])
            .await
            .unwrap();

        let found = store.find_by_identity("a@x.com").await.unwrap().unwrap();
        assert_eq!(found, created);

        let public = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(public.role, Role::Owner);
        assert!(store.find_by_id(created.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let store = store();
        store.create("a@x.com", "h", "", Role::Tester, &[]).await.unwrap();
        let err = store
            .create("a@x.com", "h", "", Role::Tester, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TabloError::DuplicateIdentity { .. }));
    }

    #[tokio::test]
    async fn update_changes_name_and_role() {
        let store = store();
        let a = store.create("a@x.com", "h", "", Role::Tester, &[]).await.unwrap();
        store.update(a.id, "Renamed", Role::Owner).await.unwrap();

        let reloaded = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(reloaded.display_name, "Renamed");
        assert_eq!(reloaded.role, Role::Owner);

        let err = store.update(a.id + 1, "x", Role::Tester).await.unwrap_err();
        assert!(matches!(err, TabloError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_preserves_creation_order() {
        let store = store();
        for identity in ["b@x.com", "a@x.com"] {
            store.create(identity, "h", "", Role::Tester, &[]).await.unwrap();
        }
        let identities: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.identity)
            .collect();
        assert_eq!(identities, ["b@x.com", "a@x.com"]);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
