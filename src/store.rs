//! Key-value store behind the presence registries.
//!
//! The relay only ever needs atomic single-key operations — get, set
//! (optionally with a TTL), delete — so the store surface is exactly that.
//! Two implementations:
//!
//! - [`RedisStore`] — production, over a multiplexed connection manager
//! - [`MemoryStore`] — in-process map for tests and single-node setups
//!
//! TTLs exist so records abandoned by a crash (a connection that never
//! sent its close notification) expire on their own instead of needing a
//! sweep task. The memory store honors expiry at read time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

/// Failure talking to the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Atomic single-key string store.
///
/// Concurrent callers never need external locking: every write is a
/// single-key upsert and every read a single-key get, with last-write-wins
/// resolution on races.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key. `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional upsert, overwriting any prior value. A `ttl` of `None`
    /// leaves the key persistent.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Idempotent delete; deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// ─── Redis ───────────────────────────────────────────────────────────────────

/// Redis-backed store over a multiplexed [`ConnectionManager`].
///
/// The manager clones cheaply and reconnects internally, so each operation
/// grabs its own handle and the store is freely shared across tasks.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let () = conn.del(key).await?;
        Ok(())
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// In-process store: a map of `key -> (value, optional deadline)`.
///
/// Expiry is checked at read time; expired entries linger until the next
/// write to the same key, which is fine for the small keyspace here.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, deadline)| {
            if is_expired(*deadline) {
                None
            } else {
                Some(value.clone())
            }
        }))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set("connection:1", "sock-A", None).await.unwrap();
        assert_eq!(
            store.get("connection:1").await.unwrap().as_deref(),
            Some("sock-A")
        );
    }

    #[tokio::test]
    async fn test_get_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("connection:404").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "v1", None).await.unwrap();
        store.set("k", "v2", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // Deleting again is not an error
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_with_ttl_refreshes_deadline() {
        let store = MemoryStore::new();
        store
            .set("k", "v1", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        store
            .set("k", "v2", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }
}
