//! Connection directory — which identity owns which live connection handle.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::store::{KvStore, StoreError};

/// Store key prefix for connection bindings.
const CONNECTION_PREFIX: &str = "connection:";

/// Maps a user id to its current connection handle.
///
/// One binding per identity. `bind` overwrites unconditionally, so a
/// reconnect silently supersedes the previous handle — the directory does
/// not detect or reject multiple simultaneous connections for one user.
/// Bindings carry a store TTL, refreshed from the heartbeat path, so a
/// connection that vanished without its close notification self-expires.
#[derive(Clone)]
pub struct ConnectionDirectory {
    store: Arc<dyn KvStore>,
    record_ttl: Duration,
}

impl ConnectionDirectory {
    pub fn new(store: Arc<dyn KvStore>, record_ttl: Duration) -> Self {
        Self { store, record_ttl }
    }

    fn key(identity_id: i64) -> String {
        format!("{CONNECTION_PREFIX}{identity_id}")
    }

    /// Unconditional upsert; overwrites any existing binding.
    pub async fn bind(&self, identity_id: i64, handle: &str) -> Result<(), StoreError> {
        self.store
            .set(&Self::key(identity_id), handle, Some(self.record_ttl))
            .await?;
        debug!(user_id = identity_id, handle = %handle, "Connection bound");
        Ok(())
    }

    /// Current handle for a user, if one is bound.
    pub async fn lookup(&self, identity_id: i64) -> Result<Option<String>, StoreError> {
        self.store.get(&Self::key(identity_id)).await
    }

    /// Idempotent delete; unbinding an unbound user is not an error.
    pub async fn unbind(&self, identity_id: i64) -> Result<(), StoreError> {
        self.store.delete(&Self::key(identity_id)).await?;
        debug!(user_id = identity_id, "Connection unbound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn directory() -> ConnectionDirectory {
        ConnectionDirectory::new(Arc::new(MemoryStore::new()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_lookup_without_bind_is_absent() {
        let dir = directory();
        assert_eq!(dir.lookup(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bind_then_lookup() {
        let dir = directory();
        dir.bind(42, "sock-A").await.unwrap();
        assert_eq!(dir.lookup(42).await.unwrap().as_deref(), Some("sock-A"));
        assert_eq!(dir.lookup(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rebind_is_last_write_wins() {
        let dir = directory();
        dir.bind(42, "sock-A").await.unwrap();
        dir.bind(42, "sock-B").await.unwrap();
        assert_eq!(dir.lookup(42).await.unwrap().as_deref(), Some("sock-B"));
    }

    #[tokio::test]
    async fn test_unbind_removes_binding() {
        let dir = directory();
        dir.bind(42, "sock-A").await.unwrap();
        dir.unbind(42).await.unwrap();
        assert_eq!(dir.lookup(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unbind_unbound_is_noop() {
        let dir = directory();
        dir.unbind(42).await.unwrap();
        assert_eq!(dir.lookup(42).await.unwrap(), None);
    }
}
