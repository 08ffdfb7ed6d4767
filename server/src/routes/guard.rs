//! Route guard: pre-render navigation gate.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs as middleware in front of every page route. It sees only the
//! request: headers and cookies. Authentication is decided from the token's
//! signature and expiry; the session store is never consulted here, so a
//! revoked-but-unexpired token still passes the guard and is rejected later
//! by the API.
//!
//! | authenticated | public | action              |
//! |---------------|--------|---------------------|
//! | no            | no     | redirect to login   |
//! | yes           | yes    | redirect to landing |
//! | no            | yes    | allow               |
//! | yes           | no     | allow               |

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::services::token::TokenService;
use crate::state::AppState;

pub const AUTH_COOKIE_NAME: &str = "auth_token";
pub const AUTH_HEADER_NAME: &str = "x-auth-token";

/// Path prefixes that bypass the guard entirely.
const EXCLUDED_PREFIXES: &[&str] = &["/api", "/static", "/pkg", "/_image", "/images"];
const EXCLUDED_EXACT: &[&str] = &["/favicon.ico", "/healthz"];
const EXCLUDED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png", "svg", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToLanding,
}

/// Whether the guard should skip `path` (API, static assets, images).
#[must_use]
pub fn is_excluded(path: &str) -> bool {
    if EXCLUDED_EXACT.contains(&path) {
        return true;
    }
    if EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/')))
    {
        return true;
    }
    path.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && !ext.contains('/') && EXCLUDED_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
    })
}

/// Whether `path` is reachable without a session.
#[must_use]
pub fn is_public(path: &str, public_paths: &[String]) -> bool {
    let trimmed = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
    public_paths.iter().any(|p| p == trimmed)
}

/// Remove an optional, case-insensitive `Bearer ` prefix.
#[must_use]
pub fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => raw[7..].trim_start(),
        _ => raw,
    }
}

/// Every token the request carries, in precedence order: `x-auth-token`
/// header, then `Authorization`, then the cookie. Empty values are skipped.
#[must_use]
pub fn token_candidates(headers: &HeaderMap) -> Vec<String> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(strip_bearer)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned)
    };
    let from_cookie = CookieJar::from_headers(headers)
        .get(AUTH_COOKIE_NAME)
        .map(|c| strip_bearer(c.value()).to_owned())
        .filter(|t| !t.is_empty());

    [from_header(AUTH_HEADER_NAME), from_header(AUTHORIZATION.as_str()), from_cookie]
        .into_iter()
        .flatten()
        .collect()
}

/// The highest-precedence token on the request. API handlers use this one
/// only; a stale header is not retried against the cookie.
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    token_candidates(headers).into_iter().next()
}

/// Signature + expiry check. Any failure means "not authenticated".
#[must_use]
pub fn is_authenticated(tokens: &TokenService, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return false;
    };
    match tokens.verify(token) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "guard token verification failed");
            false
        }
    }
}

/// First candidate that verifies. A stale `x-auth-token` header does not
/// mask a valid cookie.
#[must_use]
pub fn authenticated_token(tokens: &TokenService, headers: &HeaderMap) -> Option<String> {
    token_candidates(headers)
        .into_iter()
        .find(|token| is_authenticated(tokens, Some(token.as_str())))
}

#[must_use]
pub fn decide(authenticated: bool, public: bool) -> GuardDecision {
    match (authenticated, public) {
        (false, false) => GuardDecision::RedirectToLogin,
        (true, true) => GuardDecision::RedirectToLanding,
        _ => GuardDecision::Allow,
    }
}

/// Axum middleware applying the decision table to each navigation.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if is_excluded(&path) {
        return next.run(request).await;
    }

    let authenticated = authenticated_token(&state.tokens, request.headers()).is_some();
    let public = is_public(&path, &state.config.public_paths);

    match decide(authenticated, public) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::RedirectToLogin => {
            tracing::debug!(%path, "unauthenticated navigation redirected to login");
            Redirect::temporary(&state.config.login_path).into_response()
        }
        GuardDecision::RedirectToLanding => {
            tracing::debug!(%path, "authenticated navigation redirected to landing");
            Redirect::temporary(&state.config.landing_path).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
