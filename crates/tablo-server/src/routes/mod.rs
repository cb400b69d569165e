//! HTTP route handlers, all nested under `/api`.
//!
//! Everything except registration, login, and the health probe goes through
//! the session auth middleware.

pub mod admin;
pub mod auth;
pub mod backup;
pub mod data;
pub mod health;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::session_auth_middleware;
use crate::state::AppState;

/// Build the complete application router with all middleware applied.
pub fn build_router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    let authenticated = Router::new()
        .nest("/data", data::router())
        .nest("/admin/users", admin::router())
        .nest("/backup", backup::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            session_auth_middleware,
        ));

    let api = Router::new()
        .nest("/auth", auth::router(Arc::clone(&state)))
        .merge(health::router())
        .merge(authenticated);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
