//! Server configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and then calls [`ServerConfig::from_env`].
//! Auth settings are required: the server refuses to start without a bot
//! token to verify identity assertions and a secret to sign session tokens.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "site";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60 * 24 * 7;
pub const DEFAULT_ASSERTION_MAX_AGE_SECS: u64 = 86_400;
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/", "/login"];
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Settings consumed by the auth services and the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Telegram bot token; its SHA-256 is the HMAC key for identity assertions.
    pub bot_token: String,
    /// HS256 signing secret for session tokens.
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    /// Maximum accepted age of an identity assertion's `auth_date`.
    pub assertion_max_age_secs: u64,
    pub cookie_secure: bool,
    pub login_path: String,
    pub landing_path: String,
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    /// Build auth config from environment variables.
    ///
    /// Required:
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `JWT_SECRET` (at least 32 bytes)
    ///
    /// Optional:
    /// - `TOKEN_TTL_SECS`: default 7 days
    /// - `TELEGRAM_AUTH_MAX_AGE_SECS`: default 86400
    /// - `COOKIE_SECURE`: `true`/`false`/`1`/`0`/`yes`/`no`/`on`/`off`
    /// - `LOGIN_PATH`, `LANDING_PATH`: default `/login`, `/dashboard`
    /// - `PUBLIC_PATHS`: comma-separated, default `/,/login`
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let token_ttl_secs = env_parse("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS);
        if token_ttl_secs == 0 {
            return Err(ConfigError::Invalid { var: "TOKEN_TTL_SECS", reason: "must be positive".into() });
        }

        let login_path = normalize_path("LOGIN_PATH", std::env::var("LOGIN_PATH").ok(), DEFAULT_LOGIN_PATH)?;
        let landing_path = normalize_path("LANDING_PATH", std::env::var("LANDING_PATH").ok(), DEFAULT_LANDING_PATH)?;
        let public_paths = parse_public_paths(std::env::var("PUBLIC_PATHS").ok().as_deref())?;
        if public_paths.contains(&landing_path) {
            return Err(ConfigError::Invalid {
                var: "LANDING_PATH",
                reason: "landing path must not be public (redirect loop)".into(),
            });
        }

        Ok(Self {
            bot_token,
            jwt_secret,
            token_ttl_secs,
            assertion_max_age_secs: env_parse("TELEGRAM_AUTH_MAX_AGE_SECS", DEFAULT_ASSERTION_MAX_AGE_SECS),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            login_path,
            landing_path,
            public_paths,
        })
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres URL; when absent sessions live in memory only.
    pub database_url: Option<String>,
    pub site_dir: PathBuf,
    pub prune_interval_secs: u64,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns an error if auth config is incomplete or `PORT` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid { var: "PORT", reason: e.to_string() })?,
            Err(_) => DEFAULT_PORT,
        };
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let site_dir = std::env::var("SITE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SITE_DIR));

        Ok(Self {
            port,
            database_url,
            site_dir,
            prune_interval_secs: env_parse("SESSION_PRUNE_INTERVAL_SECS", DEFAULT_PRUNE_INTERVAL_SECS),
            auth: AuthConfig::from_env()?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn normalize_path(var: &'static str, raw: Option<String>, default: &str) -> Result<String, ConfigError> {
    let value = raw.unwrap_or_else(|| default.to_owned());
    let value = value.trim();
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid { var, reason: format!("path must start with '/': {value}") });
    }
    Ok(value.to_owned())
}

fn parse_public_paths(raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_owned()).collect());
    };
    let mut paths = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        paths.push(normalize_path("PUBLIC_PATHS", Some(part.to_owned()), "/")?);
    }
    if paths.is_empty() {
        return Err(ConfigError::Invalid { var: "PUBLIC_PATHS", reason: "no paths given".into() });
    }
    Ok(paths)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
