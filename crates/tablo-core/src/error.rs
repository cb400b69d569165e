//! Error types for `tablo-core`.
//!
//! Each variant names one failure the services can report. [`ErrorKind`]
//! groups them into the coarse taxonomy the HTTP layer maps onto status
//! codes. Variants never carry secrets or secret hashes.

use tablo_storage::StorageError;

/// Coarse classification of a [`TabloError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input.
    Validation,
    /// The request collides with existing state.
    Conflict,
    /// Missing, invalid, or expired session, or bad credentials.
    Unauthenticated,
    /// Authenticated, but the role does not allow the operation.
    Forbidden,
    /// The target does not exist.
    NotFound,
    /// Unexpected persistence or primitive failure.
    StorageFailure,
}

/// Errors from account, session, document, and backup operations.
#[derive(Debug, thiserror::Error)]
pub enum TabloError {
    /// A required request field is absent or empty.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// The secret is shorter than the minimum length.
    #[error("password must be at least {min_len} characters")]
    WeakSecret { min_len: usize },

    /// A field is present but its value is not acceptable.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// An owner tried to delete their own account.
    #[error("cannot delete your own account")]
    SelfDeletion,

    /// A backup payload failed validation; nothing was written.
    #[error("invalid backup: {reason}")]
    InvalidPayload { reason: String },

    /// The identity is already registered.
    #[error("identity '{identity}' is already registered")]
    DuplicateIdentity { identity: String },

    /// Unknown identity or wrong secret. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session token is missing, malformed, forged, or expired.
    #[error("invalid session: {reason}")]
    InvalidToken { reason: String },

    /// The caller's role does not permit the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The requested resource does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The storage backend failed.
    #[error("storage failure: {0}")]
    Storage(StorageError),

    /// A hashing, signing, or encoding primitive failed.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl TabloError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::WeakSecret { .. }
            | Self::InvalidField { .. }
            | Self::SelfDeletion
            | Self::InvalidPayload { .. } => ErrorKind::Validation,
            Self::DuplicateIdentity { .. } => ErrorKind::Conflict,
            Self::InvalidCredentials | Self::InvalidToken { .. } => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) | Self::Internal { .. } => ErrorKind::StorageFailure,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn internal(reason: impl std::fmt::Display) -> Self {
        Self::Internal {
            reason: reason.to_string(),
        }
    }
}

impl From<StorageError> for TabloError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateIdentity { identity } => Self::DuplicateIdentity { identity },
            StorageError::InvalidKey { reason, .. } => Self::InvalidField {
                field: "key",
                reason,
            },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identity_from_storage_is_a_conflict() {
        let err = TabloError::from(StorageError::DuplicateIdentity {
            identity: "a@x.com".to_owned(),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn other_storage_errors_are_storage_failures() {
        let err = TabloError::from(StorageError::Transaction {
            reason: "disk full".to_owned(),
        });
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn self_deletion_is_a_validation_error() {
        assert_eq!(TabloError::SelfDeletion.kind(), ErrorKind::Validation);
    }
}
