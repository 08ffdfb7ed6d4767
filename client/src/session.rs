//! Session manager: the one place that talks to the backend about identity.
//!
//! DESIGN
//! ======
//! The manager owns the in-memory [`SessionState`] and drives every auth
//! transition: start-up check, login, logout, and reaction to a 401/403
//! from any later API call. Token persistence goes exclusively through
//! [`SessionTokens`], and navigation through the injected [`Navigator`].
//!
//! LIFECYCLE
//! =========
//! An epoch counter guards against results landing in a context that has
//! moved on. `initialize` snapshots the epoch before its network call and
//! drops its result if the epoch changed (a login, logout, auth failure,
//! or teardown happened meanwhile). After [`SessionManager::teardown`]
//! nothing is applied at all.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::nav::Navigator;
use crate::net::api::{ApiError, AuthBackend, DEFAULT_AUTH_FAILURE};
use crate::net::types::{IdentityAssertion, UserProfile};
use crate::state::auth::SessionState;
use crate::store::{SessionTokens, StoreError};
pub use crate::util::auth::ClientRoutes;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("identity assertion is missing `{0}`")]
    InvalidAssertion(&'static str),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session context was torn down")]
    Abandoned,
}

impl SessionError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginFailed(message) => message.clone(),
            Self::Network(_) => "Network error, please try again".to_owned(),
            _ => DEFAULT_AUTH_FAILURE.to_owned(),
        }
    }
}

/// Result of the start-up session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No token was stored.
    Anonymous,
    /// The backend confirmed the stored token.
    Authenticated(UserProfile),
    /// The backend rejected the stored token; it has been cleared.
    Expired,
    /// The context moved on before the check resolved; nothing was applied.
    Abandoned,
}

pub struct SessionManager<B: AuthBackend> {
    backend: Arc<B>,
    tokens: Arc<SessionTokens>,
    navigator: Arc<dyn Navigator>,
    routes: ClientRoutes,
    state: Mutex<SessionState>,
    epoch: AtomicU64,
    torn_down: AtomicBool,
}

impl<B: AuthBackend> SessionManager<B> {
    /// A manager in the loading state; call [`initialize`](Self::initialize)
    /// once per application load.
    #[must_use]
    pub fn new(backend: Arc<B>, tokens: Arc<SessionTokens>, navigator: Arc<dyn Navigator>, routes: ClientRoutes) -> Self {
        Self {
            backend,
            tokens,
            navigator,
            routes,
            state: Mutex::new(SessionState::loading()),
            epoch: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.lock_state().user.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated()
    }

    /// The persisted token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.tokens.token()
    }

    #[must_use]
    pub fn routes(&self) -> &ClientRoutes {
        &self.routes
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn redirect_to_login_unless_public(&self) {
        let current = self.navigator.current_path();
        if !self.routes.is_public(&current) {
            self.navigator.navigate(&self.routes.login_path);
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Resolve the session from the persisted token.
    ///
    /// Transient failures leave the token in place and report
    /// [`SessionError::Network`]; the state resolves to "no confirmed user"
    /// without redirecting.
    ///
    /// # Errors
    ///
    /// [`SessionError::Network`] for non-auth backend failures and
    /// [`SessionError::Store`] when an expired token cannot be cleared.
    pub async fn initialize(&self) -> Result<InitOutcome, SessionError> {
        if self.is_torn_down() {
            return Ok(InitOutcome::Abandoned);
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.lock_state().is_loading = true;

        let Some(token) = self.tokens.token() else {
            {
                let mut state = self.lock_state();
                if !self.is_current(epoch) {
                    return Ok(InitOutcome::Abandoned);
                }
                *state = SessionState::signed_out();
            }
            tracing::debug!("no stored session token");
            self.redirect_to_login_unless_public();
            return Ok(InitOutcome::Anonymous);
        };

        let result = self.backend.current_profile(&token).await;

        let mut state = self.lock_state();
        if !self.is_current(epoch) {
            tracing::debug!("session check abandoned");
            return Ok(InitOutcome::Abandoned);
        }
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "session restored");
                *state = SessionState::signed_in(user.clone());
                Ok(InitOutcome::Authenticated(user))
            }
            Err(e) if e.is_auth_failure() => {
                tracing::info!(error = %e, "stored session token rejected");
                self.epoch.fetch_add(1, Ordering::SeqCst);
                let cleared = self.tokens.clear_session_token();
                *state = SessionState::signed_out();
                drop(state);
                self.redirect_to_login_unless_public();
                cleared?;
                Ok(InitOutcome::Expired)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session check failed");
                *state = SessionState::signed_out();
                Err(SessionError::Network(e.to_string()))
            }
        }
    }

    /// Exchange an identity assertion for a session.
    ///
    /// On any failure the previous session (state and token) is untouched.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidAssertion`] for a malformed assertion,
    /// [`SessionError::LoginFailed`] with the backend's message when it
    /// rejects the assertion, [`SessionError::Network`] on transport
    /// failure, [`SessionError::Store`] when the token cannot be persisted,
    /// and [`SessionError::Abandoned`] after teardown.
    pub async fn login(&self, assertion: IdentityAssertion) -> Result<UserProfile, SessionError> {
        assertion.check_shape().map_err(SessionError::InvalidAssertion)?;
        if self.is_torn_down() {
            return Err(SessionError::Abandoned);
        }

        let grant = match self.backend.login(&assertion).await {
            Ok(grant) => grant,
            Err(ApiError::Network(message)) => {
                tracing::warn!(error = %message, "login request failed");
                return Err(SessionError::Network(message));
            }
            Err(e) => {
                tracing::info!(telegram_id = assertion.id, error = %e, "login rejected");
                return Err(SessionError::LoginFailed(e.user_message()));
            }
        };

        {
            let mut state = self.lock_state();
            if self.is_torn_down() {
                return Err(SessionError::Abandoned);
            }
            self.tokens.set_session_token(&grant.token)?;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::signed_in(grant.user.clone());
        }
        tracing::info!(user_id = %grant.user.id, "login succeeded");
        self.navigator.navigate(&self.routes.landing_path);
        Ok(grant.user)
    }

    /// End the session. Idempotent: with no session it still navigates to
    /// the login entry point.
    ///
    /// # Errors
    ///
    /// [`SessionError::Store`] when the stores could not be cleared; the
    /// in-memory state is signed out regardless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.tokens.token() {
            if let Err(e) = self.backend.logout(&token).await {
                tracing::warn!(error = %e, "backend logout failed; clearing local session anyway");
            }
        }

        let cleared = {
            let mut state = self.lock_state();
            *state = SessionState::signed_out();
            self.tokens.clear_session_token()
        };
        self.navigator.navigate(&self.routes.login_path);
        tracing::info!("logged out");
        cleared.map_err(SessionError::from)
    }

    /// React to an error from any API call. A 401/403 ends the session and
    /// redirects; returns whether it did.
    pub fn handle_api_error(&self, error: &ApiError) -> bool {
        if !error.is_auth_failure() {
            return false;
        }
        {
            let mut state = self.lock_state();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.tokens.clear_session_token() {
                tracing::error!(error = %e, "failed to clear rejected session token");
            }
            *state = SessionState::signed_out();
        }
        tracing::info!(error = %error, "session rejected by backend");
        self.redirect_to_login_unless_public();
        true
    }

    /// Mark the owning context as gone; in-flight results are discarded.
    pub fn teardown(&self) {
        let _state = self.lock_state();
        self.torn_down.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, epoch: u64) -> bool {
        !self.is_torn_down() && self.epoch.load(Ordering::SeqCst) == epoch
    }
}
