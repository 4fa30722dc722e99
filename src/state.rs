//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::directory::ConnectionDirectory;
use crate::gateway::GatewayConnections;
use crate::identity::IdentityResolver;
use crate::presence::LivenessRegistry;
use crate::relay::Relay;

/// Shared application state for the courier server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Identity → connection handle bindings.
    pub directory: ConnectionDirectory,
    /// Identity → last-heartbeat records.
    pub liveness: LivenessRegistry,
    /// External name → identity lookup.
    pub resolver: Arc<dyn IdentityResolver>,
    /// The relay core shared by routes and the gateway.
    pub relay: Relay,
    /// Local connection-handle → sender map; the outbound transport.
    pub connections: GatewayConnections,
}
