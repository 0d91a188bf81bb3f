//! Session store — explicit, injected key/value store with TTLs.
//!
//! Sessions and one-time verification codes share one interface behind
//! distinct key prefixes. `AppState` carries an `Arc<dyn SessionStore>`;
//! production uses Redis, tests use the in-memory store. There is no
//! ambient global session map anywhere in the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::user::Role;

const SESSION_PREFIX: &str = "session:";
const CODE_PREFIX: &str = "verify-code:";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// What a session id resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub role: Role,
}

/// Minimal expiring key/value contract. Values are opaque strings; callers
/// serialize their own payloads.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError>;
    async fn expire(&self, key: &str) -> Result<(), SessionError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Typed helpers over the raw store
// ────────────────────────────────────────────────────────────────────────────

pub async fn load_session(
    store: &dyn SessionStore,
    sid: &str,
) -> Result<Option<SessionData>, SessionError> {
    match store.get(&format!("{SESSION_PREFIX}{sid}")).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn create_session(
    store: &dyn SessionStore,
    data: &SessionData,
    ttl: Duration,
) -> Result<String, SessionError> {
    let sid = Uuid::new_v4().to_string();
    let raw = serde_json::to_string(data)?;
    store.set(&format!("{SESSION_PREFIX}{sid}"), &raw, ttl).await?;
    Ok(sid)
}

pub async fn destroy_session(store: &dyn SessionStore, sid: &str) -> Result<(), SessionError> {
    store.expire(&format!("{SESSION_PREFIX}{sid}")).await
}

pub async fn put_verification_code(
    store: &dyn SessionStore,
    email: &str,
    code: &str,
    ttl: Duration,
) -> Result<(), SessionError> {
    store.set(&format!("{CODE_PREFIX}{email}"), code, ttl).await
}

/// Checks `submitted` against the stored code for `email`. Single use on
/// success only: a mismatched attempt leaves the code valid until its TTL
/// lapses, so a typo does not burn the code.
pub async fn redeem_verification_code(
    store: &dyn SessionStore,
    email: &str,
    submitted: &str,
) -> Result<bool, SessionError> {
    let key = format!("{CODE_PREFIX}{email}");
    match store.get(&key).await? {
        Some(code) if code == submitted => {
            store.expire(&key).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn expire(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory implementation (tests, local runs without Redis)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut entries = self.entries.lock().expect("session map poisoned");
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().expect("session map poisoned");
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn expire(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().expect("session map poisoned");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_roundtrip() {
        let store = MemorySessionStore::new();
        let data = SessionData {
            user_id: Uuid::new_v4(),
            role: Role::Employer,
        };

        let sid = create_session(&store, &data, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded = load_session(&store, &sid).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, data.user_id);
        assert_eq!(loaded.role, Role::Employer);

        destroy_session(&store, &sid).await.unwrap();
        assert!(load_session(&store, &sid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_gone() {
        let store = MemorySessionStore::new();
        store
            .set("session:abc", "{}", Duration::from_millis(0))
            .await
            .unwrap();
        assert!(store.get("session:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verification_code_is_single_use_on_match() {
        let store = MemorySessionStore::new();
        put_verification_code(&store, "a@b.c", "123456", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(redeem_verification_code(&store, "a@b.c", "123456")
            .await
            .unwrap());

        // Consumed by the successful attempt.
        assert!(!redeem_verification_code(&store, "a@b.c", "123456")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mistyped_code_does_not_burn_the_real_one() {
        let store = MemorySessionStore::new();
        put_verification_code(&store, "a@b.c", "123456", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!redeem_verification_code(&store, "a@b.c", "000000")
            .await
            .unwrap());

        // The correct code still works after a wrong attempt.
        assert!(redeem_verification_code(&store, "a@b.c", "123456")
            .await
            .unwrap());
    }
}
