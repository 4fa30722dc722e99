//! # courier
//!
//! Presence-aware directed event relay for the chat platform.
//!
//! courier tracks which user owns which live WebSocket connection, decides
//! who is online from periodic heartbeats, and relays typed JSON events
//! between users — including blind forwarding of the end-to-end matching
//! sub-protocol. Delivery is best effort: a 200 means "handed to the
//! transport", nothing stronger.
//!
//! ## API surface
//!
//! | Method | Path                       | Auth | Description                     |
//! |--------|----------------------------|------|---------------------------------|
//! | GET    | `/api/health`              | No   | Liveness probe                  |
//! | POST   | `/api/chat/message`        | Yes  | Relay a chat message            |
//! | POST   | `/api/chat/request`        | Yes  | Open a chat request             |
//! | POST   | `/api/chat/request/ack`    | Yes  | Acknowledge a request           |
//! | POST   | `/api/chat/request/accept` | Yes  | Accept a request                |
//! | POST   | `/api/chat/request/reject` | Yes  | Reject a request                |
//! | POST   | `/api/chat/request/cancel` | Yes  | Withdraw a request              |
//! | POST   | `/api/chat/delete`         | Yes  | Conversation-delete notice      |
//! | GET    | `/api/presence`            | Yes  | Online status of a named user   |
//! | GET    | `/api/connection`          | Yes  | Caller's own connection binding |
//! | GET    | `/api/gateway`             | Yes* | WebSocket transport             |
//!
//! *WebSocket auth is via `?token=<key>` query param (no `Authorization`
//! header available during the upgrade handshake).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use courier::auth::{self, ServiceKey};
use courier::config::Config;
use courier::directory::ConnectionDirectory;
use courier::gateway::{self, GatewayConnections};
use courier::identity::HttpResolver;
use courier::presence::LivenessRegistry;
use courier::relay::Relay;
use courier::routes;
use courier::state::AppState;
use courier::store::{KvStore, MemoryStore, RedisStore};

/// Presence-aware directed event relay for the chat platform.
#[derive(Parser)]
#[command(name = "courier", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WS server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = match cli.command {
        Some(Commands::Serve { config }) => config,
        None => None,
    };
    run_server(config_path.as_deref()).await;
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("courier v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    if config.auth.service_key == "change-me" {
        warn!("Using default service key — set COURIER_SERVICE_KEY or update config");
    }

    let store: Arc<dyn KvStore> = match config.store.backend.as_str() {
        "memory" => {
            warn!("Using in-memory store — presence state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        "redis" => {
            let store = RedisStore::connect(&config.store.redis_url)
                .await
                .expect("Failed to connect to redis");
            info!("Connected to redis at {}", config.store.redis_url);
            Arc::new(store)
        }
        other => panic!("Unknown store backend {other:?} (expected \"redis\" or \"memory\")"),
    };

    let record_ttl = config.presence.record_ttl();
    if record_ttl.as_secs() != config.presence.record_ttl_secs {
        warn!(
            "record_ttl_secs below the liveness threshold, clamped to {}s",
            record_ttl.as_secs()
        );
    }

    let directory = ConnectionDirectory::new(store.clone(), record_ttl);
    let liveness = LivenessRegistry::new(
        store.clone(),
        config.presence.liveness_threshold(),
        record_ttl,
    );
    let resolver = Arc::new(
        HttpResolver::new(
            &config.users.base_url,
            std::time::Duration::from_millis(config.users.lookup_timeout_ms),
        )
        .expect("Failed to build users service client"),
    );
    let connections = GatewayConnections::new();
    let relay = Relay::new(
        directory.clone(),
        liveness.clone(),
        resolver.clone(),
        Arc::new(connections.clone()),
    );

    let state = AppState {
        config: Arc::new(config),
        start_time: Instant::now(),
        directory,
        liveness,
        resolver,
        relay,
        connections,
    };

    // Build router
    let public_routes = Router::new().route("/api/health", get(routes::health::health));

    let authed_routes = Router::new()
        .route("/api/chat/message", post(routes::chat::send_message))
        .route("/api/chat/request", post(routes::chat::send_request))
        .route("/api/chat/request/ack", post(routes::chat::send_request_ack))
        .route(
            "/api/chat/request/accept",
            post(routes::chat::send_request_accept),
        )
        .route(
            "/api/chat/request/reject",
            post(routes::chat::send_request_reject),
        )
        .route(
            "/api/chat/request/cancel",
            post(routes::chat::send_request_cancel),
        )
        .route("/api/chat/delete", post(routes::chat::send_delete))
        .route("/api/presence", get(routes::presence::presence_query))
        .route("/api/connection", get(routes::presence::connection_query))
        .layer(middleware::from_fn(auth::require_service_key));

    let ws_route = Router::new().route("/api/gateway", get(gateway::ws_upgrade));

    let app = Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .merge(ws_route)
        .layer(Extension(ServiceKey(
            state.config.auth.service_key.clone(),
        )))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    info!("Goodbye");
}
