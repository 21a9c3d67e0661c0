//! Server-side session records keyed by opaque token.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

const KEY_PREFIX: &str = "session:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, key: &str, record: &SessionRecord, ttl_seconds: u64) -> Result<()>;

    /// Expired records read as absent.
    async fn load(&self, key: &str) -> Result<Option<SessionRecord>>;

    /// Returns whether a live record was removed.
    async fn remove(&self, key: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let store = Self { client };
        store.ping().await?;
        Ok(store)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, key: &str, record: &SessionRecord, ttl_seconds: u64) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(format!("{}{}", KEY_PREFIX, key), payload, ttl_seconds)
            .await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(format!("{}{}", KEY_PREFIX, key)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let removed: u64 = conn.del(format!("{}{}", KEY_PREFIX, key)).await?;
        Ok(removed > 0)
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<String, (SessionRecord, OffsetDateTime)>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, key: &str, record: &SessionRecord, ttl_seconds: u64) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(|ttl| now.checked_add(Duration::seconds(ttl)))
            .ok_or_else(|| anyhow!("session ttl out of range: {}", ttl_seconds))?;
        let mut sessions = self.inner.write().await;
        // Sessions whose cookie was abandoned are never loaded again.
        sessions.retain(|_, (_, expiry)| *expiry > now);
        sessions.insert(key.to_string(), (record.clone(), expires_at));
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.inner.read().await;
            match sessions.get(key) {
                Some((record, expires_at)) if *expires_at > now => {
                    return Ok(Some(record.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.inner.write().await.remove(key);
        Ok(None)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let now = OffsetDateTime::now_utc();
        let removed = self.inner.write().await.remove(key);
        Ok(matches!(removed, Some((_, expires_at)) if expires_at > now))
    }
}
