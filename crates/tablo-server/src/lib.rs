//! Tablo HTTP server.
//!
//! Wires together the core library, storage backend, and HTTP routes into a
//! running Axum server. Serves the JSON API at `/api/*`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
