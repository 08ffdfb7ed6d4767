//! Session token issuance and verification (HS256 JWT).
//!
//! DESIGN
//! ======
//! Tokens are self-verifying so the route guard can decide on a navigation
//! from the signature alone, without touching the session store. The `jti`
//! ties a token to a row in the session store, which is what logout revokes.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const JTI_BYTES: usize = 16;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Internal user id.
    pub sub: Uuid,
    /// Telegram user id.
    pub tid: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token plus the metadata needed to record it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Generate a random 16-byte hex token id.
#[must_use]
pub fn generate_jti() -> String {
    let bytes: [u8; JTI_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a token as if issued at `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_at(&self, user_id: Uuid, telegram_id: i64, now: i64) -> Result<IssuedToken, TokenError> {
        let claims = TokenClaims {
            sub: user_id,
            tid: telegram_id,
            jti: generate_jti(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, jti: claims.jti, expires_at: claims.exp })
    }

    /// Verify signature and expiry against the current time.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify signature and expiry as of `now` (unix seconds). A token is
    /// valid while `now < exp`.
    ///
    /// # Errors
    ///
    /// `Expired` once `now >= exp`, `Invalid` for anything else
    /// (bad signature, wrong algorithm, malformed token, missing claims).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        // Expiry is checked against `now` below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
