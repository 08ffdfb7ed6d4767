//! User and session persistence.
//!
//! ARCHITECTURE
//! ============
//! A session row is keyed by the token's `jti`. The profile endpoint requires
//! both a valid signature and a live row, so logout (row deleted) takes
//! effect immediately for API calls even though the signed token itself
//! stays valid until `exp`.
//!
//! Two backends implement [`SessionStore`]: Postgres for deployments and an
//! in-memory map used when `DATABASE_URL` is unset and in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::telegram::TelegramIdentity;
use super::token::unix_now;

/// User profile returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Internal user identifier.
    pub id: Uuid,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown user {0}")]
    UnknownUser(Uuid),
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or refresh the user matching `identity.telegram_id`.
    async fn upsert_user(&self, identity: &TelegramIdentity) -> Result<UserProfile, StoreError>;

    /// Record a session for `user_id` expiring at `expires_at` (unix seconds).
    async fn create_session(&self, jti: &str, user_id: Uuid, expires_at: i64) -> Result<(), StoreError>;

    /// Return the session's user if the session exists and has not expired.
    async fn find_session(&self, jti: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Delete a session. Unknown ids are not an error.
    async fn revoke_session(&self, jti: &str) -> Result<(), StoreError>;

    /// Delete expired sessions, returning how many were removed.
    async fn prune_expired(&self) -> Result<u64, StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(r: &PgRow) -> UserProfile {
    UserProfile {
        id: r.get("id"),
        telegram_id: r.get("telegram_id"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        username: r.get("username"),
        photo_url: r.get("photo_url"),
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn upsert_user(&self, identity: &TelegramIdentity) -> Result<UserProfile, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO users (telegram_id, first_name, last_name, username, photo_url)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (telegram_id) DO UPDATE SET
                  first_name = EXCLUDED.first_name,
                  last_name = EXCLUDED.last_name,
                  username = EXCLUDED.username,
                  photo_url = EXCLUDED.photo_url,
                  updated_at = now()
              RETURNING id, telegram_id, first_name, last_name, username, photo_url",
        )
        .bind(identity.telegram_id)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.username)
        .bind(&identity.photo_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile_from_row(&row))
    }

    async fn create_session(&self, jti: &str, user_id: Uuid, expires_at: i64) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO sessions (jti, user_id, expires_at) VALUES ($1, $2, to_timestamp($3))")
            .bind(jti)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, jti: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            r"SELECT u.id, u.telegram_id, u.first_name, u.last_name, u.username, u.photo_url
              FROM sessions s
              JOIN users u ON u.id = s.user_id
              WHERE s.jti = $1 AND s.expires_at > now()",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(profile_from_row))
    }

    async fn revoke_session(&self, jti: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, UserProfile>,
    by_telegram_id: HashMap<i64, Uuid>,
    /// `jti` -> (`user_id`, `expires_at`).
    sessions: HashMap<String, (Uuid, i64)>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired or not.
    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn upsert_user(&self, identity: &TelegramIdentity) -> Result<UserProfile, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner
            .by_telegram_id
            .get(&identity.telegram_id)
            .copied()
            .unwrap_or_else(Uuid::new_v4);
        let profile = UserProfile {
            id,
            telegram_id: identity.telegram_id,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            username: identity.username.clone(),
            photo_url: identity.photo_url.clone(),
        };
        inner.by_telegram_id.insert(identity.telegram_id, id);
        inner.users.insert(id, profile.clone());
        Ok(profile)
    }

    async fn create_session(&self, jti: &str, user_id: Uuid, expires_at: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::UnknownUser(user_id));
        }
        inner.sessions.insert(jti.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn find_session(&self, jti: &str) -> Result<Option<UserProfile>, StoreError> {
        let inner = self.inner.read().await;
        let now = unix_now();
        Ok(inner
            .sessions
            .get(jti)
            .filter(|(_, expires_at)| *expires_at > now)
            .and_then(|(user_id, _)| inner.users.get(user_id))
            .cloned())
    }

    async fn revoke_session(&self, jti: &str) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(jti);
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let now = unix_now();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}

// =============================================================================
// PRUNING
// =============================================================================

/// Spawn the background task that drops expired sessions every `interval`.
pub fn spawn_prune_task(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tracing::info!(interval_secs = interval.as_secs(), "session pruning configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.prune_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "pruned expired sessions"),
                Err(e) => tracing::error!(error = %e, "session pruning failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
