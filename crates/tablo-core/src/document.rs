//! Per-account JSON document store.
//!
//! The storage backend keeps document values as opaque text. This layer
//! serializes on the way in and parses on the way out. A whole batch is
//! serialized before the backend transaction begins, so an encoding failure
//! can never leave a batch half-written. A stored value that no longer
//! parses is logged and returned as its raw string; it never hides the
//! account's other documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tablo_storage::{DocumentRecord, StorageBackend};
use tracing::warn;

use crate::error::TabloError;

/// A mapping of document key to JSON value.
pub type Documents = serde_json::Map<String, Value>;

/// A decoded document and its last-write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEntry {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Serialize every value of a batch up front.
///
/// # Errors
///
/// Returns [`TabloError::Internal`] if any value fails to serialize; no
/// partial result is returned.
pub fn encode_batch(documents: &Documents) -> Result<Vec<(String, String)>, TabloError> {
    documents
        .iter()
        .map(|(key, value)| {
            serde_json::to_string(value)
                .map(|text| (key.clone(), text))
                .map_err(|e| TabloError::internal(format!("failed to encode '{key}': {e}")))
        })
        .collect()
}

fn decode(account_id: i64, record: DocumentRecord) -> (String, DocumentEntry) {
    let value = serde_json::from_str(&record.value).unwrap_or_else(|e| {
        warn!(account_id, key = %record.key, error = %e, "stored document is not valid JSON");
        Value::String(record.value)
    });
    (
        record.key,
        DocumentEntry {
            value,
            updated_at: record.updated_at,
        },
    )
}

/// Reads and writes an account's documents.
#[derive(Clone)]
pub struct DocumentStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Create a document store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Every document the account owns.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn get_all(
        &self,
        account_id: i64,
    ) -> Result<BTreeMap<String, DocumentEntry>, TabloError> {
        let records = self.storage.get_documents(account_id).await?;
        Ok(records
            .into_iter()
            .map(|record| decode(account_id, record))
            .collect())
    }

    /// Every document the account owns, without timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn get_values(&self, account_id: i64) -> Result<Documents, TabloError> {
        Ok(self
            .get_all(account_id)
            .await?
            .into_iter()
            .map(|(key, entry)| (key, entry.value))
            .collect())
    }

    /// One document, if present.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn get_one(
        &self,
        account_id: i64,
        key: &str,
    ) -> Result<Option<DocumentEntry>, TabloError> {
        Ok(self
            .storage
            .get_document(account_id, key)
            .await?
            .map(|record| decode(account_id, record).1))
    }

    /// Insert or replace one document.
    ///
    /// # Errors
    ///
    /// - [`TabloError::InvalidField`] if the key is empty or oversized.
    /// - [`TabloError::Storage`] if the backend fails.
    pub async fn upsert_one(
        &self,
        account_id: i64,
        key: &str,
        value: &Value,
    ) -> Result<(), TabloError> {
        let text = serde_json::to_string(value)
            .map_err(|e| TabloError::internal(format!("failed to encode '{key}': {e}")))?;
        self.storage.put_document(account_id, key, &text).await?;
        Ok(())
    }

    /// Insert or replace a batch of documents atomically: every entry is
    /// applied or none is.
    ///
    /// # Errors
    ///
    /// - [`TabloError::Internal`] if a value fails to encode (nothing written).
    /// - [`TabloError::InvalidField`] if a key is empty or oversized (nothing written).
    /// - [`TabloError::Storage`] if the backend fails (nothing written).
    pub async fn upsert_many(&self, account_id: i64, documents: &Documents) -> Result<(), TabloError> {
        let entries = encode_batch(documents)?;
        self.storage.put_documents(account_id, &entries).await?;
        Ok(())
    }

    /// Delete one document. Deleting a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn delete_one(&self, account_id: i64, key: &str) -> Result<(), TabloError> {
        self.storage.delete_document(account_id, key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablo_storage::{MemoryBackend, SqliteBackend};

    fn docs(value: Value) -> Documents {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    #[tokio::test]
    async fn upsert_one_twice_keeps_one_row() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        store.upsert_one(1, "rules", &json!(["a"])).await.unwrap();
        store.upsert_one(1, "rules", &json!(["a"])).await.unwrap();

        let all = store.get_all(1).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["rules"].value, json!(["a"]));
    }

    #[tokio::test]
    async fn upsert_refreshes_timestamp() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        store.upsert_one(1, "DB", &json!({"bal": 1})).await.unwrap();
        let first = store.get_one(1, "DB").await.unwrap().unwrap();
        store.upsert_one(1, "DB", &json!({"bal": 2})).await.unwrap();
        let second = store.get_one(1, "DB").await.unwrap().unwrap();

        assert_eq!(second.value, json!({"bal": 2}));
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn batch_with_failing_last_key_changes_nothing() {
        let backend = SqliteBackend::in_memory().await.unwrap();
        let storage: Arc<dyn StorageBackend> = Arc::new(backend);
        let account = storage
            .create_account(
                tablo_storage::NewAccount {
                    identity: "a@x.com",
                    secret_hash: "h",
                    display_name: "",
                    role: "owner",
                },
                &[],
            )
            .await
            .unwrap();
        let store = DocumentStore::new(storage);

        let before = docs(json!({"DB": {"ops": [1]}, "REF": {"svcs": []}, "rules": []}));
        store.upsert_many(account.id, &before).await.unwrap();

        // Keys apply in sorted order; the oversized key sorts after "rules",
        // so the first three rows are written before the batch fails.
        let mut batch = docs(json!({"DB": {"ops": [1, 2]}, "REF": {"svcs": ["x"]}, "rules": [1]}));
        batch.insert("z".repeat(tablo_storage::MAX_KEY_LEN + 1), json!("boom"));
        let err = store.upsert_many(account.id, &batch).await.unwrap_err();
        assert!(matches!(err, TabloError::InvalidField { field: "key", .. }));

        assert_eq!(store.get_values(account.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn corrupt_value_is_isolated() {
        let backend = MemoryBackend::new();
        backend.put_document(1, "DB", "{not json").await.unwrap();
        backend.put_document(1, "rules", "[1,2]").await.unwrap();
        let store = DocumentStore::new(Arc::new(backend));

        let all = store.get_values(1).await.unwrap();
        assert_eq!(all["DB"], json!("{not json"));
        assert_eq!(all["rules"], json!([1, 2]));
    }

    #[tokio::test]
    async fn accounts_do_not_see_each_other() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        store.upsert_one(1, "cpMap", &json!({"acme": "rent"})).await.unwrap();

        assert!(store.get_one(2, "cpMap").await.unwrap().is_none());
        assert!(store.get_all(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_one_removes_only_that_key() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let batch = docs(json!({"DB": {}, "FP": {}}));
        store.upsert_many(1, &batch).await.unwrap();

        store.delete_one(1, "FP").await.unwrap();
        store.delete_one(1, "FP").await.unwrap();

        let keys: Vec<String> = store.get_all(1).await.unwrap().into_keys().collect();
        assert_eq!(keys, ["DB"]);
    }
}
