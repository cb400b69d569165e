//! In-memory storage backend for testing.
//!
//! Both tables live in one `BTreeMap` pair behind a single `RwLock`, so a
//! batch write holds the write guard for its whole duration and readers never
//! see half of it. Not persistent: all data is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{AccountRecord, DocumentRecord, NewAccount, StorageBackend, StorageError, check_key};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    accounts: BTreeMap<i64, AccountRecord>,
    /// Keyed by `(account_id, key)`, so one account's rows are contiguous.
    documents: BTreeMap<(i64, String), DocumentRecord>,
}

impl Tables {
    fn upsert(&mut self, account_id: i64, key: &str, value: &str) {
        self.documents.insert(
            (account_id, key.to_owned()),
            DocumentRecord {
                key: key.to_owned(),
                value: value.to_owned(),
                updated_at: Utc::now(),
            },
        );
    }

    fn account_documents(&self, account_id: i64) -> impl Iterator<Item = &DocumentRecord> {
        self.documents
            .range((account_id, String::new())..)
            .take_while(move |((owner, _), _)| *owner == account_id)
            .map(|(_, doc)| doc)
    }
}

/// An in-memory storage backend.
///
/// Thread-safe and async-compatible. Clones share the same tables.
///
/// # Examples
///
/// ```
/// # use tablo_storage::{MemoryBackend, NewAccount, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// let account = NewAccount {
///     identity: "a@x.com",
///     secret_hash: "hash",
///     display_name: "",
///     role: "owner",
/// };
/// let created = backend.create_account(account, &[]).await.unwrap();
/// assert_eq!(created.id, 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn create_account(
        &self,
        account: NewAccount<'_>,
        documents: &[(String, String)],
    ) -> Result<AccountRecord, StorageError> {
        for (key, _) in documents {
            check_key(key)?;
        }

        let mut tables = self.tables.write().await;
        if tables
            .accounts
            .values()
            .any(|existing| existing.identity == account.identity)
        {
            return Err(StorageError::DuplicateIdentity {
                identity: account.identity.to_owned(),
            });
        }

        tables.next_id = tables.next_id.saturating_add(1);
        let record = AccountRecord {
            id: tables.next_id,
            identity: account.identity.to_owned(),
            secret_hash: account.secret_hash.to_owned(),
            display_name: account.display_name.to_owned(),
            role: account.role.to_owned(),
            created_at: Utc::now(),
        };
        tables.accounts.insert(record.id, record.clone());
        for (key, value) in documents {
            tables.upsert(record.id, key, value);
        }

        Ok(record)
    }

    async fn find_account_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<AccountRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|account| account.identity == identity)
            .cloned())
    }

    async fn find_account_by_id(&self, id: i64) -> Result<Option<AccountRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<AccountRecord>, StorageError> {
        let tables = self.tables.read().await;
        // Ids are assigned in creation order.
        Ok(tables.accounts.values().cloned().collect())
    }

    async fn count_accounts(&self) -> Result<u64, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.len() as u64)
    }

    async fn update_account(
        &self,
        id: i64,
        display_name: &str,
        role: &str,
    ) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(account) = tables.accounts.get_mut(&id) else {
            return Ok(false);
        };
        display_name.clone_into(&mut account.display_name);
        role.clone_into(&mut account.role);
        Ok(true)
    }

    async fn delete_account(&self, id: i64) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.documents.retain(|(owner, _), _| *owner != id);
        Ok(true)
    }

    async fn get_documents(&self, account_id: i64) -> Result<Vec<DocumentRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.account_documents(account_id).cloned().collect())
    }

    async fn get_document(
        &self,
        account_id: i64,
        key: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.documents.get(&(account_id, key.to_owned())).cloned())
    }

    async fn put_documents(
        &self,
        account_id: i64,
        entries: &[(String, String)],
    ) -> Result<(), StorageError> {
        // Validate the whole batch before touching any row.
        for (key, _) in entries {
            check_key(key)?;
        }

        let mut tables = self.tables.write().await;
        for (key, value) in entries {
            tables.upsert(account_id, key, value);
        }
        Ok(())
    }

    async fn delete_document(&self, account_id: i64, key: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        tables.documents.remove(&(account_id, key.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(identity: &str) -> NewAccount<'_> {
        NewAccount {
            identity,
            secret_hash: "hash",
            display_name: "",
            role: "tester",
        }
    }

    fn entry(key: &str, value: &str) -> (String, String) {
        (key.to_owned(), value.to_owned())
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let backend = MemoryBackend::new();
        let a = backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        let b = backend.create_account(new_account("b@x.com"), &[]).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let backend = MemoryBackend::new();
        backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        let err = backend
            .create_account(new_account("a@x.com"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateIdentity { .. }));
        assert_eq!(backend.count_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn identity_lookup_is_case_sensitive() {
        let backend = MemoryBackend::new();
        backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        assert!(backend.find_account_by_identity("A@x.com").await.unwrap().is_none());
        assert!(backend.find_account_by_identity("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_with_invalid_seed_persists_nothing() {
        let backend = MemoryBackend::new();
        let err = backend
            .create_account(new_account("a@x.com"), &[entry("DB", "{}"), entry("", "1")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
        assert_eq!(backend.count_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn documents_are_scoped_per_account() {
        let backend = MemoryBackend::new();
        let a = backend
            .create_account(new_account("a@x.com"), &[entry("rules", "[]")])
            .await
            .unwrap();
        let b = backend.create_account(new_account("b@x.com"), &[]).await.unwrap();

        assert_eq!(backend.get_documents(a.id).await.unwrap().len(), 1);
        assert!(backend.get_documents(b.id).await.unwrap().is_empty());
        assert!(backend.get_document(b.id, "rules").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_document_twice_keeps_one_row() {
        let backend = MemoryBackend::new();
        backend.put_document(1, "cpMap", "{}").await.unwrap();
        backend.put_document(1, "cpMap", "{}").await.unwrap();
        assert_eq!(backend.get_documents(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_batch_changes_nothing() {
        let backend = MemoryBackend::new();
        backend
            .put_documents(1, &[entry("DB", "old"), entry("REF", "old")])
            .await
            .unwrap();

        let err = backend
            .put_documents(1, &[entry("DB", "new"), entry("REF", "new"), entry("", "new")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));

        let docs = backend.get_documents(1).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|doc| doc.value == "old"));
    }

    #[tokio::test]
    async fn delete_account_cascades_documents() {
        let backend = MemoryBackend::new();
        let a = backend
            .create_account(new_account("a@x.com"), &[entry("DB", "{}"), entry("FP", "{}")])
            .await
            .unwrap();
        assert!(backend.delete_account(a.id).await.unwrap());
        assert!(backend.get_documents(a.id).await.unwrap().is_empty());
        assert!(!backend.delete_account(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_missing_account_returns_false() {
        let backend = MemoryBackend::new();
        assert!(!backend.update_account(42, "x", "owner").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_document_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete_document(1, "nope").await.unwrap();
    }
}
