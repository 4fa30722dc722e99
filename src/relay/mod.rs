//! Directed event relay core.
//!
//! The relay answers one question — "hand this named event to the live
//! connection of that user" — in three flavors:
//!
//! - [`directed`] — request/response sends with a caller waiting on a
//!   status; every failure is a distinct, surfaced condition
//! - [`blind`] — fire-and-forget forwarding of opaque sub-protocol
//!   payloads; every failure is a logged drop
//! - [`keepalive`] — fixed ack to a liveness probe, no lookups at all
//!
//! All three funnel into a single outbound primitive ([`Outbound`]), and
//! consult only the two presence registries. There is no shared mutable
//! state between calls beyond those registries, so concurrent relays never
//! need coordination.

pub mod blind;
pub mod directed;
pub mod events;
pub mod keepalive;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;

use crate::directory::ConnectionDirectory;
use crate::identity::{IdentityResolver, ResolveError};
use crate::presence::LivenessRegistry;
use crate::store::StoreError;

/// The outbound transport primitive: send one named event with a JSON
/// payload to a connection handle.
///
/// Implemented by the WebSocket gateway in production. Fire and forget —
/// the relay observes no delivery outcome, so "relayed" always means
/// "handed to the transport", never "received by the client".
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_event(&self, handle: &str, event: &str, payload: Value);
}

/// Why a directed relay call did not hand its event to the transport.
///
/// "Unknown user", "known but not connected" and "connected but not live"
/// are deliberately distinct conditions; callers see which step failed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("missing target user name")]
    MissingTarget,

    #[error("cannot target yourself")]
    SelfTarget,

    #[error("target user not found")]
    TargetNotFound,

    #[error("target user not connected")]
    TargetNotConnected,

    #[error("target user not online")]
    TargetNotOnline,

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("identity lookup failure: {0}")]
    Resolve(#[from] ResolveError),
}

impl RelayError {
    /// HTTP status for request/response callers. The three lookup misses
    /// share 404 but keep their distinct messages.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingTarget => StatusCode::BAD_REQUEST,
            Self::SelfTarget => StatusCode::FORBIDDEN,
            Self::TargetNotFound | Self::TargetNotConnected | Self::TargetNotOnline => {
                StatusCode::NOT_FOUND
            }
            Self::Store(_) | Self::Resolve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The relay core, shared by the HTTP routes and the WebSocket gateway.
#[derive(Clone)]
pub struct Relay {
    directory: ConnectionDirectory,
    liveness: LivenessRegistry,
    resolver: Arc<dyn IdentityResolver>,
    outbound: Arc<dyn Outbound>,
}

impl Relay {
    pub fn new(
        directory: ConnectionDirectory,
        liveness: LivenessRegistry,
        resolver: Arc<dyn IdentityResolver>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self {
            directory,
            liveness,
            resolver,
            outbound,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::identity::StaticResolver;
    use crate::store::MemoryStore;

    /// Outbound double that records every invocation.
    #[derive(Default)]
    pub struct RecordingOutbound {
        pub sent: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_event(&self, handle: &str, event: &str, payload: Value) {
            self.sent
                .lock()
                .await
                .push((handle.to_string(), event.to_string(), payload));
        }
    }

    pub struct Harness {
        pub relay: Relay,
        pub directory: ConnectionDirectory,
        pub liveness: LivenessRegistry,
        pub outbound: Arc<RecordingOutbound>,
    }

    /// Relay wired to a memory store, a fixed user table, and a recording
    /// outbound. Threshold 10 s to match the documented default.
    pub fn harness(resolver: StaticResolver) -> Harness {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let directory = ConnectionDirectory::new(store.clone(), Duration::from_secs(60));
        let liveness = LivenessRegistry::new(
            store,
            Duration::from_millis(10_000),
            Duration::from_secs(60),
        );
        let outbound = Arc::new(RecordingOutbound::default());
        let relay = Relay::new(
            directory.clone(),
            liveness.clone(),
            Arc::new(resolver),
            outbound.clone(),
        );
        Harness {
            relay,
            directory,
            liveness,
            outbound,
        }
    }
}
