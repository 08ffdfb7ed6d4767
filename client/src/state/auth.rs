//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Read by redirect helpers and user-aware views to coordinate login
//! redirects and identity-dependent rendering.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use crate::net::types::UserProfile;

/// Authentication state tracking the current user and loading status.
///
/// `user` is present only after the backend confirmed the stored token.
/// While `is_loading` is set, the session is unknown: neither signed in nor
/// signed out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_loading: bool,
}

impl SessionState {
    /// State at application start, before the first session check resolves.
    #[must_use]
    pub fn loading() -> Self {
        Self { user: None, is_loading: true }
    }

    #[must_use]
    pub fn signed_in(user: UserProfile) -> Self {
        Self { user: Some(user), is_loading: false }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { user: None, is_loading: false }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.is_loading && self.user.is_some()
    }
}
