//! Core library for Tablo.
//!
//! Accounts, stateless sessions, the per-account JSON document store, and
//! backup/restore. This crate depends on `tablo-storage` for the storage
//! backend trait and knows nothing about HTTP.
//!
//! The pieces compose bottom-up:
//!
//! - [`account::CredentialStore`] and [`document::DocumentStore`] wrap the
//!   backend with typed rows and JSON values.
//! - [`session::SessionIssuer`] signs and verifies session tokens.
//! - [`service::AccountService`] and [`backup::BackupService`] implement the
//!   user-facing operations on top.

pub mod account;
pub mod backup;
pub mod document;
pub mod error;
pub mod password;
pub mod section;
pub mod service;
pub mod session;

pub use error::{ErrorKind, TabloError};
