//! Telegram login-widget assertion verification.
//!
//! The widget hands the browser a set of profile fields plus a `hash`. The
//! hash is `HMAC-SHA256(SHA256(bot_token), data_check_string)` in lowercase
//! hex, so only a holder of the bot token can check it. Clients never verify
//! assertions themselves; this module is the single place that does.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Identity assertion as delivered by the login widget callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Unix seconds at which the provider signed the assertion.
    pub auth_date: i64,
    pub hash: String,
}

/// Profile fields of an assertion that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramIdentity {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo_url: Option<String>,
}

impl From<&IdentityAssertion> for TelegramIdentity {
    fn from(a: &IdentityAssertion) -> Self {
        Self {
            telegram_id: a.id,
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            username: a.username.clone(),
            photo_url: a.photo_url.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("assertion is {age_secs}s old (max {max_age_secs}s)")]
    Stale { age_secs: i64, max_age_secs: u64 },
    #[error("assertion hash is not valid hex")]
    Malformed,
    #[error("assertion signature mismatch")]
    BadSignature,
}

/// Build the newline-joined, key-sorted `key=value` string the provider signs.
/// Absent optional fields are omitted; `hash` is never included.
#[must_use]
pub fn data_check_string(a: &IdentityAssertion) -> String {
    let mut pairs: Vec<(&str, String)> = vec![
        ("auth_date", a.auth_date.to_string()),
        ("first_name", a.first_name.clone()),
        ("id", a.id.to_string()),
    ];
    if let Some(v) = &a.last_name {
        pairs.push(("last_name", v.clone()));
    }
    if let Some(v) = &a.photo_url {
        pairs.push(("photo_url", v.clone()));
    }
    if let Some(v) = &a.username {
        pairs.push(("username", v.clone()));
    }
    pairs.sort_by(|x, y| x.0.cmp(y.0));
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn assertion_mac(bot_token: &str, check_string: &str) -> HmacSha256 {
    let secret_key = Sha256::digest(bot_token.as_bytes());
    // HMAC accepts keys of any length, so construction cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&secret_key).expect("HMAC accepts keys of any size");
    mac.update(check_string.as_bytes());
    mac
}

/// Compute the hex signature the provider would attach to `a`.
#[cfg(test)]
#[must_use]
pub fn sign_assertion(a: &IdentityAssertion, bot_token: &str) -> String {
    let mac = assertion_mac(bot_token, &data_check_string(a));
    hex::encode(mac.finalize().into_bytes())
}

/// Verify freshness and signature of an identity assertion.
///
/// # Errors
///
/// `Stale` when `now - auth_date` exceeds `max_age_secs`, `Malformed` when the
/// hash is not hex, `BadSignature` when it does not match.
pub fn verify_assertion(
    a: &IdentityAssertion,
    bot_token: &str,
    now_unix: i64,
    max_age_secs: u64,
) -> Result<(), TelegramError> {
    let age_secs = now_unix.saturating_sub(a.auth_date);
    if age_secs > i64::try_from(max_age_secs).unwrap_or(i64::MAX) {
        return Err(TelegramError::Stale { age_secs, max_age_secs });
    }

    let provided = hex::decode(a.hash.trim()).map_err(|_| TelegramError::Malformed)?;
    assertion_mac(bot_token, &data_check_string(a))
        .verify_slice(&provided)
        .map_err(|_| TelegramError::BadSignature)
}

#[cfg(test)]
#[path = "telegram_test.rs"]
mod tests;
