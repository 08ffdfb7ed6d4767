//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! API routes live under `/api` and are never guarded; they authenticate per
//! request through the `AuthUser` extractor. Everything else is a page served
//! from the site directory, and every page request passes through the route
//! guard first.

pub mod auth;
pub mod guard;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Auth API routes.
fn api_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/telegram", post(auth::telegram_login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/logout", post(auth::logout))
        .layer(cors)
}

/// Full application: API + guarded static pages from `site_dir`.
pub fn app(state: AppState, site_dir: &Path) -> Router {
    let pages = ServeDir::new(site_dir).append_index_html_on_directories(true);

    api_routes()
        .route("/healthz", get(healthz))
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
