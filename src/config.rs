//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `COURIER_SERVICE_KEY`, `COURIER_LISTEN`,
//!    `COURIER_REDIS_URL`, `COURIER_USERS_URL`
//! 2. **Config file** — path via `--config <path>`, or `courier.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:4000"
//!
//! [auth]
//! service_key = "your-secret-key"
//!
//! [store]
//! backend = "redis"                 # or "memory" for single-node setups
//! redis_url = "redis://127.0.0.1:6379"
//!
//! [presence]
//! liveness_threshold_ms = 10000     # heartbeat age before a user is offline
//! record_ttl_secs = 60              # store TTL reclaiming abandoned records
//!
//! [users]
//! base_url = "http://127.0.0.1:8080"
//! lookup_timeout_ms = 3000
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:4000`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared service key. Override with `COURIER_SERVICE_KEY` env var.
    /// Defaults to `"change-me"` which triggers a startup warning.
    #[serde(default = "default_service_key")]
    pub service_key: String,
}

/// Key-value store selection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `"redis"` (default) or `"memory"`. The memory backend keeps presence
    /// state in-process and is only suitable for a single instance.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Redis connection URL. Override with `COURIER_REDIS_URL`.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

/// Presence tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Maximum heartbeat age in milliseconds before a user counts as
    /// offline (default 10 000). The single threshold for the whole system.
    #[serde(default = "default_liveness_threshold_ms")]
    pub liveness_threshold_ms: u64,
    /// Store TTL in seconds applied to connection and liveness records
    /// (default 60). Reclaims records abandoned by a crash; clamped at
    /// startup to at least the liveness threshold.
    #[serde(default = "default_record_ttl_secs")]
    pub record_ttl_secs: u64,
}

impl PresenceConfig {
    /// Liveness threshold as a [`Duration`].
    pub fn liveness_threshold(&self) -> Duration {
        Duration::from_millis(self.liveness_threshold_ms)
    }

    /// Record TTL as a [`Duration`], never below the liveness threshold —
    /// a record must not self-expire while its owner still counts as live.
    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs).max(self.liveness_threshold())
    }
}

/// Users service (identity lookup) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    /// Base URL of the internal users service. Override with
    /// `COURIER_USERS_URL`.
    #[serde(default = "default_users_base_url")]
    pub base_url: String,
    /// Per-lookup timeout in milliseconds (default 3 000).
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:4000".to_string()
}
fn default_service_key() -> String {
    "change-me".to_string()
}
fn default_store_backend() -> String {
    "redis".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_liveness_threshold_ms() -> u64 {
    10_000
}
fn default_record_ttl_secs() -> u64 {
    60
}
fn default_users_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_lookup_timeout_ms() -> u64 {
    3000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_key: default_service_key(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            liveness_threshold_ms: default_liveness_threshold_ms(),
            record_ttl_secs: default_record_ttl_secs(),
        }
    }
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            base_url: default_users_base_url(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise
    /// looks for `courier.toml` in the current directory, falling back to
    /// compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("courier.toml").exists() {
            let content =
                std::fs::read_to_string("courier.toml").expect("Failed to read courier.toml");
            toml::from_str(&content).expect("Failed to parse courier.toml")
        } else {
            Config {
                server: ServerConfig::default(),
                auth: AuthConfig::default(),
                store: StoreConfig::default(),
                presence: PresenceConfig::default(),
                users: UsersConfig::default(),
                logging: LoggingConfig::default(),
            }
        };

        // Env var overrides
        if let Ok(key) = std::env::var("COURIER_SERVICE_KEY") {
            config.auth.service_key = key;
        }
        if let Ok(listen) = std::env::var("COURIER_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(url) = std::env::var("COURIER_REDIS_URL") {
            config.store.redis_url = url;
        }
        if let Ok(url) = std::env::var("COURIER_USERS_URL") {
            config.users.base_url = url;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:4000");
        assert_eq!(config.presence.liveness_threshold_ms, 10_000);
        assert_eq!(config.store.backend, "redis");
    }

    #[test]
    fn test_record_ttl_clamped_to_threshold() {
        let config: Config = toml::from_str(
            "[presence]\nliveness_threshold_ms = 120000\nrecord_ttl_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.presence.record_ttl(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            toml::from_str("[auth]\nservice_key = \"k\"\n").unwrap();
        assert_eq!(config.auth.service_key, "k");
        assert_eq!(config.users.lookup_timeout_ms, 3000);
    }
}
