//! Auth routes: identity-assertion login, current user, logout, session probe.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use time::Duration;

use super::guard::{AUTH_COOKIE_NAME, extract_token};
use crate::services::auth::{self as auth_svc, AuthError};
use crate::services::session::UserProfile;
use crate::services::telegram::IdentityAssertion;
use crate::services::token::unix_now;
use crate::state::AppState;

pub(crate) const GENERIC_AUTH_FAILURE: &str = "Authentication failed";

#[derive(Serialize)]
struct LoginSuccess {
    success: bool,
    token: String,
    user: UserProfile,
    expires_at: i64,
}

#[derive(Serialize)]
struct Failure {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, error: &str) -> Response {
    (status, Json(Failure { success: false, error: error.to_owned() })).into_response()
}

fn session_cookie(token: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    if err.is_unauthorized() { StatusCode::UNAUTHORIZED } else { StatusCode::INTERNAL_SERVER_ERROR }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user resolved from the request's token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: UserProfile,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(&parts.headers) else {
            return Err(failure(StatusCode::UNAUTHORIZED, "missing session token"));
        };

        let app_state = AppState::from_ref(state);
        match auth_svc::current_session(&app_state, &token).await {
            Ok(session) => Ok(Self { user: session.user, token }),
            Err(e) => {
                let status = auth_error_to_status(&e);
                if status == StatusCode::UNAUTHORIZED {
                    tracing::debug!(error = %e, "rejected session token");
                    Err(failure(status, "invalid or expired session"))
                } else {
                    tracing::error!(error = %e, "session lookup failed");
                    Err(failure(status, "session lookup failed"))
                }
            }
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/telegram`: verify an identity assertion and start a session.
pub async fn telegram_login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<IdentityAssertion>, JsonRejection>,
) -> Response {
    let Json(assertion) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "malformed identity assertion");
            return failure(StatusCode::BAD_REQUEST, "invalid identity assertion");
        }
    };

    let grant = match auth_svc::login(&state, &assertion, unix_now()).await {
        Ok(grant) => grant,
        Err(e) if e.is_unauthorized() => {
            tracing::warn!(error = %e, telegram_id = assertion.id, "telegram login rejected");
            return failure(StatusCode::UNAUTHORIZED, GENERIC_AUTH_FAILURE);
        }
        Err(e) => {
            tracing::error!(error = %e, "telegram login failed");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session");
        }
    };

    let cookie = session_cookie(
        grant.token.clone(),
        Duration::seconds(state.tokens.ttl_secs()),
        state.config.cookie_secure,
    );
    let body = LoginSuccess { success: true, token: grant.token, user: grant.user, expires_at: grant.expires_at };
    (jar.add(cookie), Json(body)).into_response()
}

/// `GET /api/auth/me`: return the current user.
pub async fn me(auth: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": auth.user }))
}

/// `GET /api/auth/session`: non-failing probe; `{"user": null}` when signed out.
pub async fn session(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Json<serde_json::Value> {
    let user = match extract_token(&headers) {
        Some(token) => auth_svc::current_session(&state, &token)
            .await
            .map(|s| s.user)
            .ok(),
        None => None,
    };
    Json(serde_json::json!({ "user": user }))
}

/// `POST /api/auth/logout`: revoke the session (best effort) and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: axum::http::HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_token(&headers) {
        if let Err(e) = auth_svc::logout(&state, &token).await {
            tracing::warn!(error = %e, "session revoke failed during logout");
        }
    }

    let cookie = session_cookie(String::new(), Duration::ZERO, state.config.cookie_secure);
    (CookieJar::new().add(cookie), StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
