//! Owner-only account administration: `/api/admin/users/*`
//!
//! The auth middleware establishes the session and the owner gate rejects
//! testers before any request body is read.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::middleware as axum_mw;
use axum::routing::{get, patch};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use tablo_core::account::{PublicAccount, Role};
use tablo_core::session::Session;

use crate::error::{ApiJson, AppError};
use crate::middleware::require_owner_middleware;
use crate::routes::auth::{CredentialsRequest, UserResponse};
use crate::state::AppState;

/// Build the `/api/admin/users` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", patch(update_user).delete(delete_user))
        .route_layer(axum_mw::from_fn(require_owner_middleware))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicAccount>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub credentials: CredentialsRequest,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(alias = "displayName")]
    pub name: Option<String>,
    pub role: Option<String>,
}

fn parse_role(role: Option<&str>) -> Result<Option<Role>, AppError> {
    role.map(|r| r.parse::<Role>().map_err(AppError::BadRequest))
        .transpose()
}

// ── Handlers ─────────────────────────────────────────────────────────

/// List every account, oldest first.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserListResponse>, AppError> {
    let users = state.accounts.admin_list(&session).await?;
    Ok(Json(UserListResponse { users }))
}

/// Create an account with a chosen role (default `tester`).
async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let role = parse_role(body.role.as_deref())?;
    let user = state
        .accounts
        .admin_create(&session, body.credentials.registration(), role)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// Change an account's display name and/or role.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let role = parse_role(body.role.as_deref())?;
    let user = state
        .accounts
        .admin_update(&session, id, body.name.as_deref(), role)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// Delete another account and all of its documents.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.accounts.admin_delete(&session, id).await?;
    Ok(Json(json!({ "ok": true })))
}
