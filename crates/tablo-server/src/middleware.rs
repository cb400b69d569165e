//! Session authentication middleware.
//!
//! Reads `Authorization: Bearer <token>`, verifies it with the
//! [`SessionIssuer`](tablo_core::session::SessionIssuer), and injects the
//! resulting [`Session`] into request extensions. Owner-only routers add
//! [`require_owner_middleware`] on top, so the role is checked before any
//! body is parsed.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use tablo_core::session::Session;

use crate::error::AppError;
use crate::state::AppState;

/// Axum middleware that authenticates API requests.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the `Authorization` header is
/// missing, not a Bearer token, or the token fails verification.
pub async fn session_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate(&state, &req)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Axum middleware that admits only owner sessions.
///
/// Must run inside [`session_auth_middleware`].
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if no session was established and
/// [`AppError::Forbidden`] if the session's role is not `owner`.
pub async fn require_owner_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<Session>()
        .ok_or_else(|| AppError::Unauthorized("session required".to_owned()))?;
    session.require_owner()?;
    Ok(next.run(req).await)
}

fn authenticate(state: &AppState, req: &Request) -> Result<Session, AppError> {
    let Some(header) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(AppError::Unauthorized(
            "missing Authorization header".to_owned(),
        ));
    };

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    state.sessions.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AppError::Unauthorized("invalid or expired session".to_owned())
    })
}
