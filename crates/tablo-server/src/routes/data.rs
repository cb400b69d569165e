//! Document routes: `/api/data/*`
//!
//! Every handler is scoped to the session's own account.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use tablo_core::document::Documents;
use tablo_core::session::Session;

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

/// Build the `/api/data` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_all).put(put_all))
        .route("/{key}", get(get_one).put(put_one).delete(delete_one))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: Documents,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Every document the caller owns, keyed by name.
async fn get_all(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<DataResponse>, AppError> {
    let data = state.documents.get_values(session.account_id).await?;
    Ok(Json(DataResponse { data }))
}

/// Replace many documents at once. Body: `{"data": {key: value, ...}}`.
/// All-or-nothing.
async fn put_all(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    ApiJson(mut body): ApiJson<Value>,
) -> Result<Json<Value>, AppError> {
    let Some(Value::Object(data)) = body.get_mut("data").map(Value::take) else {
        return Err(AppError::BadRequest("data object required".to_owned()));
    };
    state
        .documents
        .upsert_many(session.account_id, &data)
        .await?;
    Ok(ok())
}

/// One document and its last-write time.
async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let entry = state
        .documents
        .get_one(session.account_id, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document '{key}' not found")))?;
    Ok(Json(DocumentResponse {
        key,
        value: entry.value,
        updated_at: entry.updated_at,
    }))
}

/// Replace one document. Body: `{"value": <any JSON, null included>}`.
async fn put_one(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>, AppError> {
    let Some(value) = body.get("value") else {
        return Err(AppError::BadRequest("value required".to_owned()));
    };
    state
        .documents
        .upsert_one(session.account_id, &key, value)
        .await?;
    Ok(ok())
}

/// Delete one document. Missing documents are not an error.
async fn delete_one(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.documents.delete_one(session.account_id, &key).await?;
    Ok(ok())
}
