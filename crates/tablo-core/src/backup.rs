//! Whole-account export and restore.
//!
//! An export is one JSON object: the account's documents flattened at the
//! top level plus three metadata keys (`version`, `exportedAt`, `user`).
//! Metadata is written last, so a document stored under one of those names
//! is shadowed in the export.
//!
//! Restore reads back only the five known sections. `DB` and `REF` must be
//! present JSON objects; the rest fall back to their empty shape. The whole
//! payload is validated before anything is written, and the write is a
//! single atomic batch.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::info;

use crate::account::PublicAccount;
use crate::document::{DocumentStore, Documents};
use crate::error::TabloError;
use crate::section::Section;

/// Value of the `version` field in every export.
pub const BACKUP_VERSION: &str = "tablo-server";

/// Exports and restores an account's documents.
#[derive(Debug, Clone)]
pub struct BackupService {
    documents: DocumentStore,
}

impl BackupService {
    #[must_use]
    pub fn new(documents: DocumentStore) -> Self {
        Self { documents }
    }

    /// Build the export object for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`TabloError::Storage`] if the backend fails.
    pub async fn export(&self, account: &PublicAccount) -> Result<Documents, TabloError> {
        let mut payload = self.documents.get_values(account.id).await?;
        payload.insert("version".to_owned(), json!(BACKUP_VERSION));
        payload.insert(
            "exportedAt".to_owned(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        payload.insert(
            "user".to_owned(),
            json!({ "email": account.identity, "name": account.display_name }),
        );
        Ok(payload)
    }

    /// Replace the account's known sections with those in `payload` and
    /// return the number of ledger operations restored.
    ///
    /// # Errors
    ///
    /// - [`TabloError::InvalidPayload`] if the payload is not an object or
    ///   `DB` / `REF` is missing or not an object. Nothing is written.
    /// - [`TabloError::Storage`] if the backend fails. Nothing is written.
    pub async fn import(&self, account_id: i64, payload: &Value) -> Result<usize, TabloError> {
        let sections = restorable_sections(payload)?;
        let ops = sections
            .get(Section::Ledger.key())
            .and_then(|ledger| ledger.get("ops"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        self.documents.upsert_many(account_id, &sections).await?;
        info!(account_id, ops, "backup restored");
        Ok(ops)
    }
}

fn restorable_sections(payload: &Value) -> Result<Documents, TabloError> {
    let Some(payload) = payload.as_object() else {
        return Err(TabloError::InvalidPayload {
            reason: "backup must be a JSON object".to_owned(),
        });
    };

    let mut sections = Documents::new();
    for section in Section::ALL {
        let key = section.key();
        let value = match payload.get(key) {
            Some(Value::Null) | None if section.is_mandatory() => {
                return Err(TabloError::InvalidPayload {
                    reason: format!("missing {key}"),
                });
            }
            Some(Value::Null) | None => section.default_value(),
            Some(value) if section.is_mandatory() && !value.is_object() => {
                return Err(TabloError::InvalidPayload {
                    reason: format!("{key} must be an object"),
                });
            }
            Some(value) => value.clone(),
        };
        sections.insert(key.to_owned(), value);
    }
    Ok(sections)
}
