//! Client-side session lifecycle for the copy-trading dashboard.
//!
//! SYSTEM CONTEXT
//! ==============
//! The login widget produces an identity assertion, [`session::SessionManager`]
//! exchanges it with the backend for a session token, and the token is
//! persisted through [`store::SessionTokens`] into both the script-readable
//! store and the guard-visible cookie. Rendering is left to whoever embeds
//! this crate; it only exposes state and navigation requests.

pub mod nav;
pub mod net;
pub mod session;
pub mod state;
pub mod store;
pub mod util;
pub mod widget;

pub use net::api::{ApiClient, ApiError, AuthBackend, HttpBackend};
pub use net::types::{IdentityAssertion, LoginGrant, UserProfile};
pub use session::{ClientRoutes, InitOutcome, SessionError, SessionManager};
pub use store::{CookieStore, ScriptStore, SessionTokens, StoreError, TokenStore};
pub use widget::{AssertionReceived, TelegramWidget, WidgetConfig, WidgetError};
