//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to open the storage backend at the given location.
    #[error("failed to open storage at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to apply the schema on startup.
    #[error("schema migration failed: {reason}")]
    Migration { reason: String },

    /// An account with this identity already exists.
    #[error("identity '{identity}' is already registered")]
    DuplicateIdentity { identity: String },

    /// Failed to read rows from storage.
    #[error("failed to read {what}: {reason}")]
    Read { what: String, reason: String },

    /// Failed to write rows to storage.
    #[error("failed to write {what}: {reason}")]
    Write { what: String, reason: String },

    /// Failed to delete rows from storage.
    #[error("failed to delete {what}: {reason}")]
    Delete { what: String, reason: String },

    /// Failed to begin or commit a transaction.
    #[error("transaction failed: {reason}")]
    Transaction { reason: String },

    /// A document key was rejected by the schema.
    #[error("invalid document key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}
