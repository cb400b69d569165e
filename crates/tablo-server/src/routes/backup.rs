//! Backup routes: `/api/backup`
//!
//! `GET` exports the caller's documents plus metadata; `POST` restores them.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{Value, json};

use tablo_core::document::Documents;
use tablo_core::session::Session;

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

/// Build the `/api/backup` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(export).post(import))
}

/// Export every document of the caller's account.
async fn export(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Documents>, AppError> {
    let account = state.accounts.get_self(session.account_id).await?;
    Ok(Json(state.backups.export(&account).await?))
}

/// Restore a previously exported payload.
async fn import(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    ApiJson(payload): ApiJson<Value>,
) -> Result<Json<Value>, AppError> {
    let ops = state.backups.import(session.account_id, &payload).await?;
    Ok(Json(json!({ "ok": true, "ops": ops })))
}
