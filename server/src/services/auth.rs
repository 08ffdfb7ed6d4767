//! Auth service: assertion login, token-backed session lookup, logout.
//!
//! ERROR HANDLING
//! ==============
//! Assertion failures carry their precise cause for logging, but the HTTP
//! layer reports all of them with one generic message so callers cannot
//! probe which check failed.

use uuid::Uuid;

use super::session::{StoreError, UserProfile};
use super::telegram::{self, IdentityAssertion, TelegramError, TelegramIdentity};
use super::token::{TokenClaims, TokenError};
use crate::state::AppState;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub expires_at: i64,
    pub user: UserProfile,
}

/// A verified, unrevoked session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserProfile,
    pub claims: TokenClaims,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity assertion rejected: {0}")]
    Assertion(#[from] TelegramError),
    #[error("session token rejected: {0}")]
    Token(#[from] TokenError),
    #[error("session not found or revoked")]
    SessionNotFound,
    #[error("token subject {0} does not match session owner")]
    SubjectMismatch(Uuid),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the caller's credentials were at fault (as opposed to the server).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Assertion(_) | Self::SessionNotFound | Self::SubjectMismatch(_) => true,
            Self::Token(e) => !matches!(e, TokenError::Signing(_)),
            Self::Store(_) => false,
        }
    }
}

/// Verify `assertion`, upsert its user, and issue a session token.
///
/// # Errors
///
/// Returns `Assertion` for stale or forged assertions, `Store`/`Token` for
/// server-side failures.
pub async fn login(state: &AppState, assertion: &IdentityAssertion, now: i64) -> Result<LoginGrant, AuthError> {
    telegram::verify_assertion(
        assertion,
        &state.config.bot_token,
        now,
        state.config.assertion_max_age_secs,
    )?;

    let user = state
        .store
        .upsert_user(&TelegramIdentity::from(assertion))
        .await?;
    let issued = state.tokens.issue_at(user.id, user.telegram_id, now)?;
    state
        .store
        .create_session(&issued.jti, user.id, issued.expires_at)
        .await?;

    tracing::info!(user_id = %user.id, telegram_id = user.telegram_id, "session created");
    Ok(LoginGrant { token: issued.token, expires_at: issued.expires_at, user })
}

/// Resolve a token to its live session.
///
/// # Errors
///
/// `Token` for bad/expired tokens, `SessionNotFound` for revoked sessions.
pub async fn current_session(state: &AppState, token: &str) -> Result<AuthSession, AuthError> {
    let claims = state.tokens.verify(token)?;
    let user = state
        .store
        .find_session(&claims.jti)
        .await?
        .ok_or(AuthError::SessionNotFound)?;
    if user.id != claims.sub {
        return Err(AuthError::SubjectMismatch(claims.sub));
    }
    Ok(AuthSession { user, claims })
}

/// Revoke the session behind `token`. Tokens that fail verification are ignored.
///
/// # Errors
///
/// Returns `Store` if the revocation write fails.
pub async fn logout(state: &AppState, token: &str) -> Result<(), AuthError> {
    let Ok(claims) = state.tokens.verify(token) else {
        tracing::debug!("logout with unverifiable token; nothing to revoke");
        return Ok(());
    };
    state.store.revoke_session(&claims.jti).await?;
    tracing::info!(user_id = %claims.sub, "session revoked");
    Ok(())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
