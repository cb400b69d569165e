//! Account authentication routes: `/api/auth/*`
//!
//! Registration and login are public. `/me` requires a session.

use std::sync::Arc;

use axum::extract::State;
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use tablo_core::account::PublicAccount;
use tablo_core::service::{Authenticated, Registration};
use tablo_core::session::Session;

use crate::error::{ApiJson, AppError};
use crate::middleware::session_auth_middleware;
use crate::state::AppState;

/// Build the `/api/auth` router.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route_layer(axum_mw::from_fn_with_state(state, session_auth_middleware))
        .route("/register", post(register))
        .route("/login", post(login))
}

// ── Request / Response types ─────────────────────────────────────────

/// Body of register and login. Wire names follow the client application;
/// the descriptive names are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default, alias = "identity")]
    pub email: String,
    #[serde(default, alias = "secret")]
    pub password: String,
    #[serde(default, alias = "displayName")]
    pub name: String,
}

impl CredentialsRequest {
    pub(crate) fn registration(&self) -> Registration<'_> {
        Registration {
            identity: &self.email,
            secret: &self.password,
            display_name: &self.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicAccount,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Create an account and sign it in.
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CredentialsRequest>,
) -> Result<Json<Authenticated>, AppError> {
    Ok(Json(state.accounts.register(body.registration()).await?))
}

/// Exchange identity and secret for a session token.
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CredentialsRequest>,
) -> Result<Json<Authenticated>, AppError> {
    Ok(Json(state.accounts.login(&body.email, &body.password).await?))
}

/// The caller's own account.
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.accounts.get_self(session.account_id).await?;
    Ok(Json(UserResponse { user }))
}
