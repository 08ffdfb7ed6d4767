//! Shared auth routing helpers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every view applies identical unauthenticated redirect behavior, and the
//! public/protected split matches the route guard's so the client never
//! redirects somewhere the guard would bounce straight back.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use crate::state::auth::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/dashboard";
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/", LOGIN_PATH];

/// Login entry point, landing area, and the public path list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRoutes {
    pub login_path: String,
    pub landing_path: String,
    pub public_paths: Vec<String>,
}

impl Default for ClientRoutes {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_owned(),
            landing_path: LANDING_PATH.to_owned(),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

impl ClientRoutes {
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        is_public_path(path, &self.public_paths)
    }
}

/// Path without query/fragment and without a trailing slash (root stays `/`).
fn route_of(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Exact match against the public list, ignoring query and trailing slash.
#[must_use]
pub fn is_public_path(path: &str, public_paths: &[String]) -> bool {
    let route = route_of(path);
    public_paths.iter().any(|p| route_of(p) == route)
}

/// Redirect to login whenever auth has loaded and no user is present.
#[must_use]
pub fn should_redirect_unauth(state: &SessionState) -> bool {
    !state.is_loading && state.user.is_none()
}

/// As [`should_redirect_unauth`], but only off public paths.
#[must_use]
pub fn should_redirect_unauth_at(state: &SessionState, path: &str, routes: &ClientRoutes) -> bool {
    should_redirect_unauth(state) && !routes.is_public(path)
}
