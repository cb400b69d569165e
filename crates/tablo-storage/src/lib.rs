//! Storage backend abstraction for Tablo.
//!
//! This crate defines the [`StorageBackend`] trait, a small relational
//! interface over two tables: `accounts` and `documents` keyed by
//! `(account_id, key)`. It knows nothing about roles, sessions, or what the
//! documents contain. Document values are opaque text; `tablo-core` handles
//! JSON encoding above this layer.
//!
//! Two implementations are provided:
//!
//! - [`SqliteBackend`]: production default, backed by SQLite in WAL mode
//!   (feature `sqlite-backend`)
//! - [`MemoryBackend`]: in-memory, for tests and throwaway dev servers

mod error;
mod memory;
#[cfg(feature = "sqlite-backend")]
mod sqlite_backend;

use chrono::{DateTime, Utc};

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "sqlite-backend")]
pub use sqlite_backend::SqliteBackend;

/// A persisted account row, including the secret hash.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlite-backend", derive(sqlx::FromRow))]
pub struct AccountRecord {
    pub id: i64,
    pub identity: String,
    pub secret_hash: String,
    pub display_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new account row.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub identity: &'a str,
    pub secret_hash: &'a str,
    pub display_name: &'a str,
    pub role: &'a str,
}

/// A persisted document row. `value` is the serialized document text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlite-backend", derive(sqlx::FromRow))]
pub struct DocumentRecord {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A pluggable relational storage backend.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`)
/// and must apply [`put_documents`](StorageBackend::put_documents) and
/// [`create_account`](StorageBackend::create_account) atomically: readers
/// never observe a partially-applied batch.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Insert an account together with its initial documents in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateIdentity`] if the identity is taken,
    /// or [`StorageError::Write`] / [`StorageError::Transaction`] if the
    /// backend fails. On any error nothing is persisted.
    async fn create_account(
        &self,
        account: NewAccount<'_>,
        documents: &[(String, String)],
    ) -> Result<AccountRecord, StorageError>;

    /// Look up an account by its exact (case-sensitive) identity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn find_account_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<AccountRecord>, StorageError>;

    /// Look up an account by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn find_account_by_id(&self, id: i64) -> Result<Option<AccountRecord>, StorageError>;

    /// List all accounts ordered by creation time, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn list_accounts(&self) -> Result<Vec<AccountRecord>, StorageError>;

    /// Count accounts.
    ///
    /// The default implementation lists every account. Backends may
    /// override this with a cheaper query.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn count_accounts(&self) -> Result<u64, StorageError> {
        Ok(self.list_accounts().await?.len() as u64)
    }

    /// Replace an account's display name and role.
    ///
    /// Returns `false` if no such account exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn update_account(
        &self,
        id: i64,
        display_name: &str,
        role: &str,
    ) -> Result<bool, StorageError>;

    /// Delete an account and, by cascade, all of its documents.
    ///
    /// Returns `false` if no such account existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the backend fails.
    async fn delete_account(&self, id: i64) -> Result<bool, StorageError>;

    /// Fetch every document owned by an account, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_documents(&self, account_id: i64) -> Result<Vec<DocumentRecord>, StorageError>;

    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_document(
        &self,
        account_id: i64,
        key: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    /// Insert or replace one document, refreshing its timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty or oversized key, or
    /// [`StorageError::Write`] if the backend fails.
    async fn put_document(
        &self,
        account_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        self.put_documents(account_id, &[(key.to_owned(), value.to_owned())])
            .await
    }

    /// Insert or replace a batch of documents in a single transaction.
    ///
    /// Either every entry is applied or none is.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if any key is empty or oversized, or
    /// [`StorageError::Write`] / [`StorageError::Transaction`] if the
    /// backend fails. On any error nothing is persisted.
    async fn put_documents(
        &self,
        account_id: i64,
        entries: &[(String, String)],
    ) -> Result<(), StorageError>;

    /// Delete one document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the backend fails.
    async fn delete_document(&self, account_id: i64, key: &str) -> Result<(), StorageError>;
}

/// Longest document key the schema accepts, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Reject keys the schema does not allow.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: String::new(),
            reason: "document keys must not be empty".to_owned(),
        });
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey {
            key: key.chars().take(32).collect(),
            reason: format!("document keys are limited to {MAX_KEY_LEN} bytes"),
        });
    }
    Ok(())
}
