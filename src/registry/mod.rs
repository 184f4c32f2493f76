//! Registry module for listing repositories and tags
//!
//! Three registry dialects are supported behind the single [`RegistryClient`] trait:
//! the hub search/tags API, registry protocol v1 and registry protocol v2.
//! The pipeline only ever talks to the trait.

pub mod auth;
pub mod hub;
pub mod paging;
pub mod transport;
pub mod v1;
pub mod v2;

use crate::config::{ApiVersion, DEFAULT_OWNER, RegistryConfig};
use crate::error::Result;
use crate::logging::Logger;
use async_trait::async_trait;
use std::sync::Arc;

pub use hub::HubClient;
pub use transport::{HttpTransport, RegistryTransport};
pub use v1::V1Client;
pub use v2::V2Client;

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Dialect spoken by this client
    fn api(&self) -> ApiVersion;

    /// Repositories belonging to `owner`.
    ///
    /// The default owner (`""` or `library`) yields official repositories only; any other owner
    /// yields repositories named `owner/...`.
    async fn list_repositories(&self, owner: &str) -> Result<Vec<String>>;

    /// Every tag of `repository`
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;
}

/// Build the client matching `config.api`
pub fn connect(config: &RegistryConfig, output: &Logger) -> Result<Box<dyn RegistryClient>> {
    let transport: Arc<dyn RegistryTransport> = Arc::new(HttpTransport::new(config)?);
    Ok(connect_with_transport(config, transport, output))
}

pub fn connect_with_transport(
    config: &RegistryConfig,
    transport: Arc<dyn RegistryTransport>,
    output: &Logger,
) -> Box<dyn RegistryClient> {
    match config.api {
        ApiVersion::Hub => Box::new(HubClient::new(config, transport, output.clone())),
        ApiVersion::V1 => Box::new(V1Client::new(config, transport, output.clone())),
        ApiVersion::V2 => Box::new(V2Client::new(config, transport, output.clone())),
    }
}

pub(crate) fn is_default_owner(owner: &str) -> bool {
    owner.is_empty() || owner == DEFAULT_OWNER
}

/// Whether `name` belongs to a named owner
pub(crate) fn is_owned_by(name: &str, owner: &str) -> bool {
    name.strip_prefix(owner)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::testing::ScriptedTransport;

    #[test]
    fn test_owner_prefix_matching() {
        assert!(is_owned_by("acme/app", "acme"));
        assert!(!is_owned_by("acmecorp/app", "acme"));
        assert!(!is_owned_by("acme", "acme"));
        assert!(!is_owned_by("acme/", "acme"));
    }

    #[test]
    fn test_default_owner() {
        assert!(is_default_owner(""));
        assert!(is_default_owner("library"));
        assert!(!is_default_owner("acme"));
    }

    #[test]
    fn test_connect_selects_dialect() {
        let logger = Logger::new_quiet();
        let transport: Arc<dyn RegistryTransport> = Arc::new(ScriptedTransport::new());
        let hub = RegistryConfig::new("", ApiVersion::V2, "acme");
        let v1 = RegistryConfig::new("registry.example.com", ApiVersion::V1, "acme");
        let v2 = RegistryConfig::new("registry.example.com", ApiVersion::V2, "acme");

        assert_eq!(
            connect_with_transport(&hub, transport.clone(), &logger).api(),
            ApiVersion::Hub
        );
        assert_eq!(
            connect_with_transport(&v1, transport.clone(), &logger).api(),
            ApiVersion::V1
        );
        assert_eq!(
            connect_with_transport(&v2, transport, &logger).api(),
            ApiVersion::V2
        );
    }
}
