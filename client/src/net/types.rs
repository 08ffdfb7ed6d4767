//! Shared wire DTOs for the client/server boundary.
//!
//! DESIGN
//! ======
//! These types mirror the server's auth payloads so serde round-trips stay
//! lossless. Envelopes are crate-private: callers only see the unwrapped
//! values or an `ApiError`.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};

/// Identity assertion produced by the Telegram login widget.
///
/// The `hash` is opaque to the client; only the backend can check it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Unix seconds.
    pub auth_date: i64,
    pub hash: String,
}

impl IdentityAssertion {
    /// Presence checks only; signature and freshness are the backend's job.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing or empty required field.
    pub fn check_shape(&self) -> Result<(), &'static str> {
        if self.id <= 0 {
            return Err("id");
        }
        if self.first_name.trim().is_empty() {
            return Err("first_name");
        }
        if self.auth_date <= 0 {
            return Err("auth_date");
        }
        if self.hash.trim().is_empty() {
            return Err("hash");
        }
        Ok(())
    }
}

/// The signed-in user's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Internal user identifier (UUID string).
    pub id: String,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// `first last`, falling back to `@username`, then the first name alone.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.last_name, &self.username) {
            (Some(last), _) if !last.is_empty() => format!("{} {last}", self.first_name),
            (_, Some(username)) if !username.is_empty() => format!("{} (@{username})", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// Token and profile returned by a successful login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub user: UserProfile,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginEnvelope {
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub expires_at: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: Option<String>,
}
