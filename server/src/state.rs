//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the route guard via the
//! `State` extractor. The guard only ever touches `tokens` and `config`; the
//! session store is reserved for the API handlers.

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::session::SessionStore;
use crate::services::token::TokenService;

/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub tokens: TokenService,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AuthConfig, store: Arc<dyn SessionStore>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_secs);
        Self { config: Arc::new(config), tokens, store }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::config::{DEFAULT_ASSERTION_MAX_AGE_SECS, DEFAULT_TOKEN_TTL_SECS};
    use crate::services::session::MemorySessionStore;

    pub const TEST_BOT_TOKEN: &str = "777000:test-bot-token";
    pub const TEST_JWT_SECRET: &str = "test-secret-test-secret-test-secret!";

    #[must_use]
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            bot_token: TEST_BOT_TOKEN.into(),
            jwt_secret: TEST_JWT_SECRET.into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            assertion_max_age_secs: DEFAULT_ASSERTION_MAX_AGE_SECS,
            cookie_secure: false,
            login_path: "/login".into(),
            landing_path: "/dashboard".into(),
            public_paths: vec!["/".into(), "/login".into()],
        }
    }

    /// `AppState` backed by an in-memory session store.
    #[must_use]
    pub fn test_app_state() -> AppState {
        test_app_state_with_store().0
    }

    /// Like [`test_app_state`], also returning the concrete store for inspection.
    #[must_use]
    pub fn test_app_state_with_store() -> (AppState, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let state = AppState::new(test_auth_config(), store.clone());
        (state, store)
    }
}
