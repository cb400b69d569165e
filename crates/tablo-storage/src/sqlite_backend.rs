//! SQLite storage backend, the production default.
//!
//! Wraps an `sqlx` connection pool behind the [`StorageBackend`] trait. The
//! database runs in WAL mode so readers proceed while a single writer holds
//! the lock, and foreign keys are enforced so deleting an account cascades to
//! its documents. Batch writes run inside one transaction; dropping an
//! uncommitted transaction rolls it back.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::{AccountRecord, DocumentRecord, NewAccount, StorageBackend, StorageError, check_key};

const SCHEMA: [&str; 3] = [
    r"CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL UNIQUE,
        secret_hash TEXT NOT NULL,
        display_name TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL DEFAULT 'tester' CHECK (role IN ('owner', 'tester')),
        created_at TEXT NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS documents (
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        key TEXT NOT NULL CHECK (key <> '' AND length(CAST(key AS BLOB)) <= 128),
        value TEXT NOT NULL DEFAULT '{}',
        updated_at TEXT NOT NULL,
        PRIMARY KEY (account_id, key)
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_account ON documents(account_id)",
];

const UPSERT_DOCUMENT: &str = r"INSERT INTO documents (account_id, key, value, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT (account_id, key)
    DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// A storage backend backed by a SQLite database file.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Examples
///
/// ```no_run
/// # use tablo_storage::SqliteBackend;
/// # #[tokio::main]
/// # async fn main() {
/// let backend = SqliteBackend::open("/var/lib/tablo/tablo.db").await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) the database file at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the file cannot be opened, or
    /// [`StorageError::Migration`] if the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Self::with_pool(pool, path.to_path_buf()).await
    }

    /// Open a private in-memory database.
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite `:memory:` connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] or [`StorageError::Migration`].
    pub async fn in_memory() -> Result<Self, StorageError> {
        let open_err = |e: sqlx::Error| StorageError::Open {
            path: ":memory:".to_owned(),
            reason: e.to_string(),
        };
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(open_err)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(open_err)?;

        Self::with_pool(pool, PathBuf::from(":memory:")).await
    }

    async fn with_pool(pool: SqlitePool, path: PathBuf) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StorageError::Migration {
                    reason: e.to_string(),
                })?;
        }
        tracing::debug!(path = %path.display(), "sqlite schema ready");
        Ok(Self { pool, path })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_err(what: &str) -> impl FnOnce(sqlx::Error) -> StorageError + '_ {
    move |e| StorageError::Read {
        what: what.to_owned(),
        reason: e.to_string(),
    }
}

fn write_err(what: &str) -> impl FnOnce(sqlx::Error) -> StorageError + '_ {
    move |e| StorageError::Write {
        what: what.to_owned(),
        reason: e.to_string(),
    }
}

fn tx_err(e: sqlx::Error) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

#[async_trait::async_trait]
impl StorageBackend for SqliteBackend {
    async fn create_account(
        &self,
        account: NewAccount<'_>,
        documents: &[(String, String)],
    ) -> Result<AccountRecord, StorageError> {
        for (key, _) in documents {
            check_key(key)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        let record = sqlx::query_as::<_, AccountRecord>(
            r"INSERT INTO accounts (identity, secret_hash, display_name, role, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5)
              RETURNING id, identity, secret_hash, display_name, role, created_at",
        )
        .bind(account.identity)
        .bind(account.secret_hash)
        .bind(account.display_name)
        .bind(account.role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::DuplicateIdentity {
                    identity: account.identity.to_owned(),
                }
            }
            _ => StorageError::Write {
                what: "account".to_owned(),
                reason: e.to_string(),
            },
        })?;

        for (key, value) in documents {
            sqlx::query(UPSERT_DOCUMENT)
                .bind(record.id)
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(write_err(key))?;
        }

        tx.commit().await.map_err(tx_err)?;
        Ok(record)
    }

    async fn find_account_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<AccountRecord>, StorageError> {
        sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE identity = ?1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err("account"))
    }

    async fn find_account_by_id(&self, id: i64) -> Result<Option<AccountRecord>, StorageError> {
        sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err("account"))
    }

    async fn list_accounts(&self) -> Result<Vec<AccountRecord>, StorageError> {
        // AUTOINCREMENT ids are handed out in insertion order, which is
        // creation order; `created_at` text does not sort reliably.
        sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(read_err("accounts"))
    }

    async fn count_accounts(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(read_err("accounts"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update_account(
        &self,
        id: i64,
        display_name: &str,
        role: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE accounts SET display_name = ?1, role = ?2 WHERE id = ?3")
            .bind(display_name)
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_err("account"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                what: format!("account {id}"),
                reason: e.to_string(),
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_documents(&self, account_id: i64) -> Result<Vec<DocumentRecord>, StorageError> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT key, value, updated_at FROM documents WHERE account_id = ?1 ORDER BY key",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err("documents"))
    }

    async fn get_document(
        &self,
        account_id: i64,
        key: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT key, value, updated_at FROM documents WHERE account_id = ?1 AND key = ?2",
        )
        .bind(account_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err(key))
    }

    async fn put_documents(
        &self,
        account_id: i64,
        entries: &[(String, String)],
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(tx_err)?;

        for (key, value) in entries {
            // The schema enforces the same key rules; checking here gives a
            // typed error. Returning early drops `tx`, which rolls back prior rows.
            check_key(key)?;
            sqlx::query(UPSERT_DOCUMENT)
                .bind(account_id)
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(write_err(key))?;
        }

        tx.commit().await.map_err(tx_err)
    }

    async fn delete_document(&self, account_id: i64, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM documents WHERE account_id = ?1 AND key = ?2")
            .bind(account_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                what: key.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> SqliteBackend {
        SqliteBackend::in_memory().await.unwrap()
    }

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
    async fn create_and_find_account() {
        let backend = backend().await;
        let created = backend
            .create_account(new_account("a@x.com"), &[entry("rules", "[]")])
            .await
            .unwrap();

        let by_identity = backend.find_account_by_identity("a@x.com").await.unwrap();
        assert_eq!(by_identity.as_ref().map(|a| a.id), Some(created.id));

        let by_id = backend.find_account_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.identity, "a@x.com");
        assert_eq!(by_id.role, "tester");
    }

    #[tokio::test]
    async fn duplicate_identity_maps_to_typed_error() {
        let backend = backend().await;
        backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        let err = backend
            .create_account(new_account("a@x.com"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateIdentity { .. }));
    }

    #[tokio::test]
    async fn unknown_role_violates_check_constraint() {
        let backend = backend().await;
        let account = NewAccount {
            role: "superuser",
            ..new_account("a@x.com")
        };
        assert!(backend.create_account(account, &[]).await.is_err());
        assert_eq!(backend.count_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let backend = backend().await;
        for identity in ["c@x.com", "a@x.com", "b@x.com"] {
            backend.create_account(new_account(identity), &[]).await.unwrap();
        }
        let identities: Vec<String> = backend
            .list_accounts()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.identity)
            .collect();
        assert_eq!(identities, ["c@x.com", "a@x.com", "b@x.com"]);
        assert_eq!(backend.count_accounts().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn upsert_replaces_value_without_duplicating() {
        let backend = backend().await;
        let a = backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        backend.put_document(a.id, "DB", r#"{"v":1}"#).await.unwrap();
        backend.put_document(a.id, "DB", r#"{"v":2}"#).await.unwrap();

        let docs = backend.get_documents(a.id).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].value, r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn failed_batch_rolls_back() {
        let backend = backend().await;
        let a = backend
            .create_account(new_account("a@x.com"), &[entry("DB", "old"), entry("REF", "old")])
            .await
            .unwrap();

        let err = backend
            .put_documents(
                a.id,
                &[entry("DB", "new"), entry("REF", "new"), entry("", "new")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));

        let docs = backend.get_documents(a.id).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|doc| doc.value == "old"));
    }

    #[tokio::test]
    async fn documents_for_unknown_account_violate_foreign_key() {
        let backend = backend().await;
        assert!(backend.put_document(99, "DB", "{}").await.is_err());
    }

    #[tokio::test]
    async fn delete_account_cascades() {
        let backend = backend().await;
        let a = backend
            .create_account(new_account("a@x.com"), &[entry("DB", "{}"), entry("FP", "{}")])
            .await
            .unwrap();
        assert!(backend.delete_account(a.id).await.unwrap());
        assert!(backend.get_documents(a.id).await.unwrap().is_empty());
        assert!(!backend.delete_account(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_account_reports_missing_rows() {
        let backend = backend().await;
        let a = backend.create_account(new_account("a@x.com"), &[]).await.unwrap();
        assert!(backend.update_account(a.id, "Alice", "owner").await.unwrap());
        assert!(!backend.update_account(a.id + 1, "Bob", "owner").await.unwrap());

        let reloaded = backend.find_account_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(reloaded.display_name, "Alice");
        assert_eq!(reloaded.role, "owner");
    }

    #[tokio::test]
    async fn delete_document_is_idempotent() {
        let backend = backend().await;
        let a = backend
            .create_account(new_account("a@x.com"), &[entry("rules", "[]")])
            .await
            .unwrap();
        backend.delete_document(a.id, "rules").await.unwrap();
        backend.delete_document(a.id, "rules").await.unwrap();
        assert!(backend.get_document(a.id, "rules").await.unwrap().is_none());
    }
}
