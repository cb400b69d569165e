//! Server configuration for Tablo.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Every `TABLO_*` variable also has the bare name older deployments
//! used (`PORT`, `DB_PATH`, `JWT_SECRET`) as a fallback.

use std::net::SocketAddr;

/// Default port when neither `TABLO_BIND_ADDR` nor `PORT` is set.
const DEFAULT_PORT: u16 = 3000;

/// Default request body limit in megabytes. Full backups travel in one body.
const DEFAULT_BODY_LIMIT_MB: usize = 50;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Session signing secret. `None` means generate one per process.
    pub session_secret: Option<String>,
    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("storage_backend", &self.storage_backend)
            .field("log_level", &self.log_level)
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `SQLite` file in WAL mode.
    Sqlite { path: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TABLO_BIND_ADDR` — full bind address (default: `127.0.0.1:3000`)
    /// - `PORT` — port to bind on `0.0.0.0` (used when `TABLO_BIND_ADDR` is unset)
    /// - `TABLO_STORAGE` — `sqlite` or `memory` (default: `sqlite`)
    /// - `TABLO_DB_PATH` / `DB_PATH` — `SQLite` file (default: `./tablo.db`)
    /// - `TABLO_SESSION_SECRET` / `JWT_SECRET` — session signing secret
    /// - `TABLO_LOG_LEVEL` — log filter (default: `info`)
    /// - `TABLO_BODY_LIMIT_MB` — request body limit (default: `50`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let either = |primary: &str, fallback: &str| var(primary).or_else(|| var(fallback));

        // Priority: TABLO_BIND_ADDR > PORT > default 127.0.0.1:3000
        let bind_addr = if let Some(addr) = var("TABLO_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port_str) = var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage_backend = match var("TABLO_STORAGE")
            .unwrap_or_else(|| "sqlite".to_owned())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackendType::Memory,
            _ => StorageBackendType::Sqlite {
                path: either("TABLO_DB_PATH", "DB_PATH")
                    .unwrap_or_else(|| "./tablo.db".to_owned()),
            },
        };

        let log_level = var("TABLO_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let session_secret =
            either("TABLO_SESSION_SECRET", "JWT_SECRET").filter(|s| !s.is_empty());

        let body_limit_mb = var("TABLO_BODY_LIMIT_MB")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_BODY_LIMIT_MB);

        Self {
            bind_addr,
            storage_backend,
            log_level,
            session_secret,
            body_limit_bytes: body_limit_mb.saturating_mul(1024 * 1024),
        }
    }
}
