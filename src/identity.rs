//! Tenant-scoped identities and the external name lookup.
//!
//! Identities are created and owned by the users service; courier never
//! creates one, it only resolves a human-readable name to the numeric id
//! the registries are keyed by. The lookup is behind [`IdentityResolver`]
//! so tests (and single-tenant tooling) can swap in a fixed table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// A tenant-scoped user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Tenant the user belongs to; scopes every name lookup.
    pub tenant: String,
    /// Numeric user id, unique across tenants. The registries key on this.
    pub id: i64,
    /// Normalized user name (see [`normalize_name`]).
    pub name: String,
}

/// Trim surrounding whitespace and lower-case a user-supplied name.
///
/// Applied to every name before comparison or lookup, so `" Alice "` and
/// `"alice"` address the same user.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Failure talking to the users service.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("users service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("users service returned status {0}")]
    Status(u16),
}

/// Resolve a normalized name to an identity within a tenant.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` when no such user exists in the tenant.
    async fn resolve(&self, tenant: &str, name: &str)
        -> Result<Option<Identity>, ResolveError>;
}

// ─── Users service client ────────────────────────────────────────────────────

/// Shape of the users service lookup response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    user_id: i64,
    user_name: String,
}

/// Production resolver: asks the internal users service.
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResolver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityResolver for HttpResolver {
    async fn resolve(
        &self,
        tenant: &str,
        name: &str,
    ) -> Result<Option<Identity>, ResolveError> {
        let url = format!("{}/internal/users/lookup", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("tenant", tenant), ("name", name)])
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let body: LookupResponse = response.json().await?;
                Ok(Some(Identity {
                    tenant: tenant.to_string(),
                    id: body.user_id,
                    name: normalize_name(&body.user_name),
                }))
            }
            404 => Ok(None),
            status => Err(ResolveError::Status(status)),
        }
    }
}

// ─── Fixed-table resolver ────────────────────────────────────────────────────

/// Resolver over a fixed `(tenant, name) -> identity` table. The test
/// double for [`HttpResolver`].
#[derive(Default)]
pub struct StaticResolver {
    users: HashMap<(String, String), Identity>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user; the name is normalized on insert.
    #[must_use]
    pub fn with(mut self, tenant: &str, id: i64, name: &str) -> Self {
        let name = normalize_name(name);
        self.users.insert(
            (tenant.to_string(), name.clone()),
            Identity {
                tenant: tenant.to_string(),
                id,
                name,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(
        &self,
        tenant: &str,
        name: &str,
    ) -> Result<Option<Identity>, ResolveError> {
        Ok(self
            .users
            .get(&(tenant.to_string(), name.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_name("  Alice "), "alice");
        assert_eq!(normalize_name("BOB"), "bob");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
    }

    #[tokio::test]
    async fn test_static_resolver_scopes_by_tenant() {
        let resolver = StaticResolver::new()
            .with("acme", 7, "Alice")
            .with("globex", 8, "alice");

        let acme = resolver.resolve("acme", "alice").await.unwrap().unwrap();
        assert_eq!(acme.id, 7);

        let globex = resolver.resolve("globex", "alice").await.unwrap().unwrap();
        assert_eq!(globex.id, 8);

        assert!(resolver.resolve("initech", "alice").await.unwrap().is_none());
    }
}
