#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

//! courier library — the presence-aware directed event relay.
//!
//! Building blocks:
//! - `store` — key-value store trait with Redis and in-memory backends
//! - `directory` — identity → connection-handle bindings
//! - `presence` — identity → last-heartbeat liveness records
//! - `identity` — name normalization and the external identity lookup
//! - `relay` — directed, blind, and keepalive relay flavors
//! - `auth` — service-key middleware and caller identity extraction
//! - `routes` — REST API route handlers
//! - `gateway` — WebSocket transport and the outbound primitive
//! - `config` — configuration loading

pub mod auth;
pub mod config;
pub mod directory;
pub mod gateway;
pub mod identity;
pub mod presence;
pub mod relay;
pub mod routes;
pub mod state;
pub mod store;
pub mod util;

// Re-export key types at crate root for convenience.
pub use auth::ServiceKey;
pub use config::Config;
pub use directory::ConnectionDirectory;
pub use identity::{Identity, IdentityResolver};
pub use presence::LivenessRegistry;
pub use relay::{Outbound, Relay, RelayError};
pub use state::AppState;
pub use store::{KvStore, MemoryStore, RedisStore};
