//! Domain services used by the HTTP routes and the route guard.
//!
//! ARCHITECTURE
//! ============
//! Service modules own verification and persistence so route handlers stay
//! focused on protocol translation. `telegram` and `token` are pure; `session`
//! owns storage; `auth` composes the three into login/lookup/logout flows.

pub mod auth;
pub mod session;
pub mod telegram;
pub mod token;
