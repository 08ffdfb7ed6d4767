use super::*;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================
// Helpers
// =============================================================

/// Store that can be switched into a failing mode mid-test.
struct FlakyStore {
    inner: ScriptStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self { inner: ScriptStore::in_memory(), failing: AtomicBool::new(false) }
    }

    fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable { store: "flaky" })
        } else {
            Ok(())
        }
    }
}

impl TokenStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        self.inner.load()
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save(token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.clear()
    }
}

// =============================================================
// ScriptStore
// =============================================================

#[test]
fn script_store_memory_save_load_clear() {
    let store = ScriptStore::in_memory();
    assert_eq!(store.load().unwrap(), None);
    store.save("tok").unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn script_store_file_uses_access_token_key_and_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ls.json");
    std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

    let store = ScriptStore::open(&path);
    store.save("tok").unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["accessToken"], "tok");
    assert_eq!(doc["theme"], "dark");

    store.clear().unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(doc.get("accessToken").is_none());
    assert_eq!(doc["theme"], "dark");
}

#[test]
fn script_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScriptStore::open(dir.path().join("nested").join("ls.json"));
    assert_eq!(store.load().unwrap(), None);
    store.save("tok").unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
}

#[test]
fn script_store_corrupt_file_is_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ls.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(ScriptStore::open(&path).load(), Err(StoreError::Serde(_))));
}

// =============================================================
// CookieStore
// =============================================================

#[test]
fn session_cookie_has_expected_attributes() {
    let cookie = session_cookie("tok");
    assert_eq!(cookie.name(), AUTH_COOKIE_NAME);
    assert_eq!(cookie.value(), "tok");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.max_age(), Some(time::Duration::seconds(COOKIE_MAX_AGE_SECS)));
}

#[test]
fn cookie_store_expires_after_max_age() {
    let store = CookieStore::in_memory();
    store.save_at("tok", 1_000).unwrap();
    assert_eq!(store.load_at(1_000 + COOKIE_MAX_AGE_SECS - 1).unwrap().as_deref(), Some("tok"));
    assert_eq!(store.load_at(1_000 + COOKIE_MAX_AGE_SECS).unwrap(), None);
}

#[test]
fn cookie_store_file_round_trips_set_cookie_string() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cookies.json");
    let store = CookieStore::open(&path);
    store.save("tok").unwrap();

    let reopened = CookieStore::open(&path);
    assert_eq!(reopened.load().unwrap().as_deref(), Some("tok"));
    let raw = reopened.set_cookie_string().unwrap().unwrap();
    assert!(raw.starts_with("auth_token=tok"));
    assert!(raw.contains("Path=/"));
    assert!(raw.contains("SameSite=Lax"));

    reopened.clear().unwrap();
    assert!(!path.exists());
    reopened.clear().unwrap();
}

#[test]
fn cookie_header_value_is_name_value_only() {
    assert_eq!(cookie_header_value("tok"), "auth_token=tok");
}

// =============================================================
// SessionTokens
// =============================================================

#[test]
fn set_and_clear_keep_both_stores_in_lockstep() {
    let tokens = SessionTokens::in_memory();
    assert!(tokens.is_consistent());
    assert_eq!(tokens.token(), None);

    tokens.set_session_token("tok").unwrap();
    assert_eq!(tokens.token().as_deref(), Some("tok"));
    assert_eq!(tokens.cookie_header().as_deref(), Some("auth_token=tok"));
    assert!(tokens.is_consistent());

    tokens.clear_session_token().unwrap();
    assert_eq!(tokens.token(), None);
    assert_eq!(tokens.cookie_header(), None);
    assert!(tokens.is_consistent());
}

#[test]
fn new_token_overwrites_previous() {
    let tokens = SessionTokens::in_memory();
    tokens.set_session_token("first").unwrap();
    tokens.set_session_token("second").unwrap();
    assert_eq!(tokens.token().as_deref(), Some("second"));
    assert_eq!(tokens.cookie_header().as_deref(), Some("auth_token=second"));
}

#[test]
fn failed_cookie_write_rolls_back_script_store() {
    let script = Arc::new(ScriptStore::in_memory());
    let cookie = Arc::new(FlakyStore::new());
    let tokens = SessionTokens::new(script.clone(), cookie.clone());

    tokens.set_session_token("old").unwrap();
    cookie.fail();

    let err = tokens.set_session_token("new").unwrap_err();
    assert!(matches!(err, StoreError::Inconsistent { .. }));
    assert_eq!(script.load().unwrap().as_deref(), Some("old"));
    assert!(tokens.is_consistent());
}

#[test]
fn failed_cookie_write_on_first_login_leaves_no_token() {
    let cookie = Arc::new(FlakyStore::new());
    cookie.fail();
    let tokens = SessionTokens::new(Arc::new(ScriptStore::in_memory()), cookie);

    assert!(tokens.set_session_token("tok").is_err());
    assert_eq!(tokens.token(), None);
}

#[test]
fn failed_cookie_clear_restores_script_token() {
    let cookie = Arc::new(FlakyStore::new());
    let tokens = SessionTokens::new(Arc::new(ScriptStore::in_memory()), cookie.clone());
    tokens.set_session_token("tok").unwrap();
    cookie.fail();

    let err = tokens.clear_session_token().unwrap_err();
    assert!(matches!(err, StoreError::Inconsistent { .. }));
    assert_eq!(tokens.token().as_deref(), Some("tok"));
    assert!(tokens.is_consistent());
}

#[test]
fn failed_script_write_touches_nothing() {
    let script = Arc::new(FlakyStore::new());
    script.fail();
    let cookie = Arc::new(CookieStore::in_memory());
    let tokens = SessionTokens::new(script, cookie.clone());

    assert!(matches!(tokens.set_session_token("tok"), Err(StoreError::Unavailable { .. })));
    assert_eq!(cookie.load().unwrap(), None);
}

#[test]
fn file_backed_tokens_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    SessionTokens::open(dir.path()).set_session_token("tok").unwrap();

    let reopened = SessionTokens::open(dir.path());
    assert_eq!(reopened.token().as_deref(), Some("tok"));
    assert!(reopened.is_consistent());
}
