//! Shared application state for the Tablo server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use tablo_core::account::CredentialStore;
use tablo_core::backup::BackupService;
use tablo_core::document::DocumentStore;
use tablo_core::service::AccountService;
use tablo_core::session::SessionIssuer;
use tablo_storage::StorageBackend;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Registration, login, and account administration.
    pub accounts: AccountService,
    /// Per-account document reads and writes.
    pub documents: DocumentStore,
    /// Whole-account export and restore.
    pub backups: BackupService,
    /// Session token verification for the auth middleware.
    pub sessions: Arc<SessionIssuer>,
}

impl AppState {
    /// Wire every service over one storage backend and session issuer.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, sessions: Arc<SessionIssuer>) -> Self {
        let documents = DocumentStore::new(Arc::clone(&storage));
        Self {
            accounts: AccountService::new(CredentialStore::new(storage), Arc::clone(&sessions)),
            backups: BackupService::new(documents.clone()),
            documents,
            sessions,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
