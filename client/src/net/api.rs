//! REST helpers for talking to the auth backend.
//!
//! Every outgoing request carries the session token twice: as an
//! `Authorization: Bearer` header for the API layer and as `x-auth-token` for
//! the route guard. Redirects are never followed so callers can observe the
//! guard's decisions directly.
//!
//! ERROR HANDLING
//! ==============
//! Status codes are classified once, in [`classify_status`]. 401 and 403 are
//! always [`ApiError::Unauthorized`] so the session manager can treat them as
//! "token is dead" without inspecting bodies.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE, LOCATION};
use reqwest::{Method, RequestBuilder};

use super::types::{ErrorEnvelope, IdentityAssertion, LoginEnvelope, LoginGrant, ProfileEnvelope, UserProfile};
use crate::store::SessionTokens;

/// Message shown when the backend rejects a login without saying why.
pub const DEFAULT_AUTH_FAILURE: &str = "Authentication failed";

const TOKEN_HEADER: &str = "x-auth-token";
const LOGIN_ENDPOINT: &str = "/api/auth/telegram";
const PROFILE_ENDPOINT: &str = "/api/auth/me";
const LOGOUT_ENDPOINT: &str = "/api/auth/logout";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("not authorized (status {status})")]
    Unauthorized { status: u16 },
    #[error("login rejected: {message}")]
    Rejected { message: String },
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True when the backend says the token is invalid or expired.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Human-readable message suitable for a login form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message } | Self::Status { message, .. } => message.clone(),
            Self::Network(_) => "Network error, please try again".to_owned(),
            Self::Unauthorized { .. } | Self::Decode(_) => DEFAULT_AUTH_FAILURE.to_owned(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Pull the `error` field out of a JSON error body, if there is one.
pub(crate) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .filter(|msg| !msg.trim().is_empty())
}

/// Map a non-success status to an [`ApiError`].
pub(crate) fn classify_status(status: u16, message: Option<String>) -> ApiError {
    match status {
        401 | 403 => ApiError::Unauthorized { status },
        _ => ApiError::Status { status, message: message.unwrap_or_else(|| format!("request failed: {status}")) },
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// Identity operations the session manager needs from the backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange an identity assertion for a session token.
    async fn login(&self, assertion: &IdentityAssertion) -> Result<LoginGrant, ApiError>;

    /// Fetch the profile that owns `token`.
    async fn current_profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    /// Revoke `token` server-side.
    async fn logout(&self, token: &str) -> Result<(), ApiError>;
}

/// Response of a plain page navigation, as the route guard answered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitOutcome {
    pub status: u16,
    /// Redirect target when the guard sent one.
    pub location: Option<String>,
}

impl VisitOutcome {
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

// =============================================================================
// HTTP BACKEND
// =============================================================================

/// reqwest-backed [`AuthBackend`].
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    /// Issue an arbitrary JSON API call.
    ///
    /// An empty success body decodes as `Value::Null`.
    ///
    /// # Errors
    ///
    /// Non-success statuses go through [`classify_status`]; transport and
    /// decode failures map to `Network` / `Decode`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut builder = Self::with_token(self.http.request(method, self.url(path)), token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&text)));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Request a page the way a browser navigation would, sending only the
    /// given `Cookie` header.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] on transport failure. Any HTTP status is
    /// a successful visit.
    pub async fn visit(&self, path: &str, cookie_header: Option<&str>) -> Result<VisitOutcome, ApiError> {
        let mut builder = self.http.get(self.url(path));
        if let Some(cookie) = cookie_header {
            builder = builder.header(COOKIE, cookie);
        }
        let resp = builder.send().await?;
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(VisitOutcome { status: resp.status().as_u16(), location })
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, assertion: &IdentityAssertion) -> Result<LoginGrant, ApiError> {
        let resp = self.http.post(self.url(LOGIN_ENDPOINT)).json(assertion).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.is_server_error() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text).unwrap_or_else(|| DEFAULT_AUTH_FAILURE.to_owned()),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Rejected {
                message: error_message(&text).unwrap_or_else(|| DEFAULT_AUTH_FAILURE.to_owned()),
            });
        }

        let env: LoginEnvelope = serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        match (env.success, env.token, env.user) {
            (true, Some(token), Some(user)) if !token.is_empty() => {
                Ok(LoginGrant { token, user, expires_at: env.expires_at })
            }
            _ => Err(ApiError::Rejected { message: env.error.unwrap_or_else(|| DEFAULT_AUTH_FAILURE.to_owned()) }),
        }
    }

    async fn current_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let resp = Self::with_token(self.http.get(self.url(PROFILE_ENDPOINT)), Some(token))
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), error_message(&text)));
        }
        let env: ProfileEnvelope = serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(env.user)
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let resp = Self::with_token(self.http.post(self.url(LOGOUT_ENDPOINT)), Some(token))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), error_message(&text)))
    }
}

// =============================================================================
// API CLIENT
// =============================================================================

/// Application-facing API handle that attaches the stored token to every call.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<HttpBackend>,
    tokens: Arc<SessionTokens>,
}

impl ApiClient {
    #[must_use]
    pub fn new(http: Arc<HttpBackend>, tokens: Arc<SessionTokens>) -> Self {
        Self { http, tokens }
    }

    /// # Errors
    ///
    /// See [`HttpBackend::request`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        let token = self.tokens.token();
        self.http.request(method, path, token.as_deref(), body).await
    }

    /// Navigate to `path` carrying the guard-visible cookie.
    ///
    /// # Errors
    ///
    /// See [`HttpBackend::visit`].
    pub async fn visit(&self, path: &str) -> Result<VisitOutcome, ApiError> {
        let cookie = self.tokens.cookie_header();
        self.http.visit(path, cookie.as_deref()).await
    }
}
