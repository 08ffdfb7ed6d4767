//! Session token persistence.
//!
//! DESIGN
//! ======
//! The token lives in two places: a script-readable key/value store that the
//! application reads on start-up, and the `auth_token` cookie that the route
//! guard sees on navigation. [`SessionTokens`] is the only type that writes
//! either one; it treats a write to both as a single operation and rolls the
//! first store back when the second fails.
//!
//! Both stores can be file-backed (one JSON document each) or in-memory.
//! File writes go through a temp file and a rename so a crash never leaves a
//! half-written document behind.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Key of the token inside the script-readable store.
pub const SCRIPT_TOKEN_KEY: &str = "accessToken";
/// Name of the guard-visible cookie.
pub const AUTH_COOKIE_NAME: &str = "auth_token";
/// Cookie lifetime: seven days.
pub const COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

const SCRIPT_FILE: &str = "local_storage.json";
const COOKIE_FILE: &str = "cookies.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("stored cookie is malformed: {0}")]
    Cookie(String),
    #[error("{store} store is unavailable")]
    Unavailable { store: &'static str },
    #[error("token stores diverged: {detail}")]
    Inconsistent { detail: String },
}

/// One place a copy of the session token is kept.
pub trait TokenStore: Send + Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing document cannot be read.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing document cannot be written.
    fn save(&self, token: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing document cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// SCRIPT STORE
// =============================================================================

enum ScriptBacking {
    Memory(Mutex<BTreeMap<String, String>>),
    File(PathBuf),
}

/// Script-readable key/value store, the equivalent of browser local storage.
///
/// Unrelated keys already in the document are preserved on every write.
pub struct ScriptStore {
    backing: ScriptBacking,
}

impl ScriptStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self { backing: ScriptBacking::Memory(Mutex::new(BTreeMap::new())) }
    }

    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { backing: ScriptBacking::File(path.into()) }
    }

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        match read_optional(path)? {
            Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
            _ => Ok(BTreeMap::new()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
        match &self.backing {
            ScriptBacking::Memory(map) => {
                apply(&mut map.lock().unwrap_or_else(PoisonError::into_inner));
                Ok(())
            }
            ScriptBacking::File(path) => {
                let mut map = Self::read_map(path)?;
                apply(&mut map);
                write_atomic(path, &serde_json::to_vec_pretty(&map)?)
            }
        }
    }
}

impl TokenStore for ScriptStore {
    fn name(&self) -> &'static str {
        "script"
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        let token = match &self.backing {
            ScriptBacking::Memory(map) => map
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(SCRIPT_TOKEN_KEY)
                .cloned(),
            ScriptBacking::File(path) => Self::read_map(path)?.remove(SCRIPT_TOKEN_KEY),
        };
        Ok(token.filter(|t| !t.is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(SCRIPT_TOKEN_KEY.to_owned(), token.to_owned());
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(SCRIPT_TOKEN_KEY);
        })
    }
}

// =============================================================================
// COOKIE STORE
// =============================================================================

/// Persisted form of the cookie: the `Set-Cookie` string plus its absolute
/// expiry so a reload can drop it once it has lapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CookieRecord {
    set_cookie: String,
    expires_at: i64,
}

enum CookieBacking {
    Memory(Mutex<Option<CookieRecord>>),
    File(PathBuf),
}

/// Guard-visible `auth_token` cookie jar.
pub struct CookieStore {
    backing: CookieBacking,
}

/// Build the `auth_token` cookie as the client sets it.
#[must_use]
pub fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE_NAME, token.to_owned()))
        .path("/")
        .max_age(time::Duration::seconds(COOKIE_MAX_AGE_SECS))
        .same_site(SameSite::Lax)
        .build()
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl CookieStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self { backing: CookieBacking::Memory(Mutex::new(None)) }
    }

    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { backing: CookieBacking::File(path.into()) }
    }

    fn read_record(&self) -> Result<Option<CookieRecord>, StoreError> {
        match &self.backing {
            CookieBacking::Memory(slot) => Ok(slot.lock().unwrap_or_else(PoisonError::into_inner).clone()),
            CookieBacking::File(path) => match read_optional(path)? {
                Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
                _ => Ok(None),
            },
        }
    }

    fn write_record(&self, record: Option<CookieRecord>) -> Result<(), StoreError> {
        match &self.backing {
            CookieBacking::Memory(slot) => {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = record;
                Ok(())
            }
            CookieBacking::File(path) => match record {
                Some(record) => write_atomic(path, &serde_json::to_vec_pretty(&record)?),
                None => match std::fs::remove_file(path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                },
            },
        }
    }

    /// Store the cookie as if it were set at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the jar cannot be written.
    pub fn save_at(&self, token: &str, now: i64) -> Result<(), StoreError> {
        let record = CookieRecord {
            set_cookie: session_cookie(token).to_string(),
            expires_at: now + COOKIE_MAX_AGE_SECS,
        };
        self.write_record(Some(record))
    }

    /// Read the cookie value, treating it as absent once `now` passes its
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the jar is unreadable or the stored
    /// cookie does not parse.
    pub fn load_at(&self, now: i64) -> Result<Option<String>, StoreError> {
        let Some(record) = self.read_record()? else {
            return Ok(None);
        };
        if record.expires_at <= now {
            return Ok(None);
        }
        let cookie = Cookie::parse(record.set_cookie).map_err(|e| StoreError::Cookie(e.to_string()))?;
        if cookie.name() != AUTH_COOKIE_NAME || cookie.value().is_empty() {
            return Ok(None);
        }
        Ok(Some(cookie.value().to_owned()))
    }

    /// Full `Set-Cookie` string of the stored cookie, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the jar is unreadable.
    pub fn set_cookie_string(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read_record()?.map(|r| r.set_cookie))
    }
}

impl TokenStore for CookieStore {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        self.load_at(now_unix())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        self.save_at(token, now_unix())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write_record(None)
    }
}

/// `Cookie` request header value carrying `token`.
#[must_use]
pub fn cookie_header_value(token: &str) -> String {
    Cookie::new(AUTH_COOKIE_NAME, token).stripped().to_string()
}

// =============================================================================
// SESSION TOKENS
// =============================================================================

/// The single write path for the session token.
pub struct SessionTokens {
    script: Arc<dyn TokenStore>,
    cookie: Arc<dyn TokenStore>,
}

impl SessionTokens {
    #[must_use]
    pub fn new(script: Arc<dyn TokenStore>, cookie: Arc<dyn TokenStore>) -> Self {
        Self { script, cookie }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(ScriptStore::in_memory()), Arc::new(CookieStore::in_memory()))
    }

    /// File-backed stores under `dir`.
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        Self::new(
            Arc::new(ScriptStore::open(dir.join(SCRIPT_FILE))),
            Arc::new(CookieStore::open(dir.join(COOKIE_FILE))),
        )
    }

    /// The persisted token, read from the script store.
    ///
    /// An unreadable store counts as "no token".
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match self.script.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(store = self.script.name(), error = %e, "token store unreadable");
                None
            }
        }
    }

    /// `Cookie` header the guard would see on the next navigation.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        match self.cookie.load() {
            Ok(token) => token.map(|t| cookie_header_value(&t)),
            Err(e) => {
                tracing::warn!(store = self.cookie.name(), error = %e, "cookie jar unreadable");
                None
            }
        }
    }

    /// True when both stores hold the same token (or neither holds one).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match (self.script.load(), self.cookie.load()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Persist `token` into both stores.
    ///
    /// # Errors
    ///
    /// Fails without touching either store when the first write fails. When
    /// the second write fails, the first store is restored and
    /// [`StoreError::Inconsistent`] is returned.
    pub fn set_session_token(&self, token: &str) -> Result<(), StoreError> {
        let previous = self.script.load()?;
        self.script.save(token)?;
        if let Err(e) = self.cookie.save(token) {
            self.restore_script(previous.as_deref());
            return Err(StoreError::Inconsistent { detail: format!("{} write failed: {e}", self.cookie.name()) });
        }
        tracing::debug!("session token stored");
        Ok(())
    }

    /// Remove the token from both stores.
    ///
    /// # Errors
    ///
    /// Same contract as [`set_session_token`](Self::set_session_token).
    pub fn clear_session_token(&self) -> Result<(), StoreError> {
        let previous = self.script.load()?;
        self.script.clear()?;
        if let Err(e) = self.cookie.clear() {
            self.restore_script(previous.as_deref());
            return Err(StoreError::Inconsistent { detail: format!("{} clear failed: {e}", self.cookie.name()) });
        }
        tracing::debug!("session token cleared");
        Ok(())
    }

    fn restore_script(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(token) => self.script.save(token),
            None => self.script.clear(),
        };
        if let Err(e) = restored {
            tracing::error!(store = self.script.name(), error = %e, "token rollback failed");
        }
    }
}
