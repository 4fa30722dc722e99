//! Liveness registry — last-seen heartbeat timestamps per identity.
//!
//! Records are never actively expired; staleness is computed at read time
//! against the configured threshold. The store TTL on each record only
//! reclaims entries abandoned by a crash, it plays no part in the online/
//! offline decision.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::store::{KvStore, StoreError};

/// Store key prefix for liveness records.
const LIVENESS_PREFIX: &str = "liveness:";

/// Result of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Whether the identity counts as online right now.
    pub live: bool,
    /// Last heartbeat as epoch millis; `None` when never seen.
    pub last_seen_ms: Option<u64>,
}

/// Tracks when each identity was last heard from.
///
/// There is exactly one liveness threshold for the whole system — every
/// consumer of the online/offline predicate goes through this registry,
/// so no call site can end up with a different effective default.
#[derive(Clone)]
pub struct LivenessRegistry {
    store: Arc<dyn KvStore>,
    threshold: Duration,
    record_ttl: Duration,
}

impl LivenessRegistry {
    pub fn new(store: Arc<dyn KvStore>, threshold: Duration, record_ttl: Duration) -> Self {
        Self {
            store,
            threshold,
            record_ttl,
        }
    }

    fn key(identity_id: i64) -> String {
        format!("{LIVENESS_PREFIX}{identity_id}")
    }

    /// Record a liveness signal at `now_ms`.
    ///
    /// A missing identity is silently ignored: this sits on a best-effort
    /// signal path with no caller to answer, and a heartbeat that raced a
    /// session teardown is not worth an error.
    pub async fn touch(
        &self,
        identity_id: Option<i64>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let Some(id) = identity_id else {
            warn!("Liveness signal without an identity, ignoring");
            return Ok(());
        };
        self.store
            .set(&Self::key(id), &now_ms.to_string(), Some(self.record_ttl))
            .await
    }

    /// Classify an identity as online/offline as of `now_ms`.
    ///
    /// Online means a record exists and `now - last_seen` is strictly under
    /// the threshold. A malformed stored value counts as never-seen rather
    /// than raising.
    pub async fn is_live(&self, identity_id: i64, now_ms: u64) -> Result<Liveness, StoreError> {
        let raw = self.store.get(&Self::key(identity_id)).await?;

        let last_seen_ms = match raw.as_deref().map(str::parse::<u64>) {
            Some(Ok(ts)) => Some(ts),
            Some(Err(_)) => {
                warn!(
                    user_id = identity_id,
                    value = raw.as_deref().unwrap_or(""),
                    "Malformed liveness record, treating as never seen"
                );
                None
            }
            None => None,
        };

        #[allow(clippy::cast_possible_truncation)]
        let threshold_ms = self.threshold.as_millis() as u64;
        let live = last_seen_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < threshold_ms);

        Ok(Liveness { live, last_seen_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const THRESHOLD_MS: u64 = 10_000;

    fn registry() -> (LivenessRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = LivenessRegistry::new(
            store.clone(),
            Duration::from_millis(THRESHOLD_MS),
            Duration::from_secs(60),
        );
        (registry, store)
    }

    #[tokio::test]
    async fn test_never_seen_is_offline() {
        let (registry, _) = registry();
        let liveness = registry.is_live(42, 1_000_000).await.unwrap();
        assert!(!liveness.live);
        assert_eq!(liveness.last_seen_ms, None);
    }

    #[tokio::test]
    async fn test_live_just_inside_threshold() {
        let (registry, _) = registry();
        let t0 = 1_000_000;
        registry.touch(Some(42), t0).await.unwrap();

        let liveness = registry.is_live(42, t0 + THRESHOLD_MS - 1).await.unwrap();
        assert!(liveness.live);
        assert_eq!(liveness.last_seen_ms, Some(t0));
    }

    #[tokio::test]
    async fn test_stale_just_past_threshold() {
        let (registry, _) = registry();
        let t0 = 1_000_000;
        registry.touch(Some(42), t0).await.unwrap();

        let liveness = registry.is_live(42, t0 + THRESHOLD_MS + 1).await.unwrap();
        assert!(!liveness.live);
        assert_eq!(liveness.last_seen_ms, Some(t0));
    }

    #[tokio::test]
    async fn test_exactly_at_threshold_is_stale() {
        let (registry, _) = registry();
        let t0 = 1_000_000;
        registry.touch(Some(42), t0).await.unwrap();

        let liveness = registry.is_live(42, t0 + THRESHOLD_MS).await.unwrap();
        assert!(!liveness.live);
    }

    #[tokio::test]
    async fn test_touch_refreshes_last_seen() {
        let (registry, _) = registry();
        registry.touch(Some(42), 1_000).await.unwrap();
        registry.touch(Some(42), 5_000).await.unwrap();

        let liveness = registry.is_live(42, 5_001).await.unwrap();
        assert_eq!(liveness.last_seen_ms, Some(5_000));
        assert!(liveness.live);
    }

    #[tokio::test]
    async fn test_touch_without_identity_is_noop() {
        let (registry, store) = registry();
        registry.touch(None, 1_000).await.unwrap();
        assert!(store.get("liveness:0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_record_is_offline() {
        let (registry, store) = registry();
        store
            .set("liveness:42", "not-a-number", None)
            .await
            .unwrap();

        let liveness = registry.is_live(42, 1_000).await.unwrap();
        assert!(!liveness.live);
        assert_eq!(liveness.last_seen_ms, None);
    }
}
