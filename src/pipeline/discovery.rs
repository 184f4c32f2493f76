//! Source-side discovery: repositories of the owner and the tags of each

use crate::error::Result;
use crate::logging::Logger;
use crate::registry::RegistryClient;
use std::collections::HashMap;

/// Repository name → tags in registry order
pub type RepositoryTagMap = HashMap<String, Vec<String>>;

/// Outcome of the discovery phase
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub tags: RepositoryTagMap,
    /// Repositories whose tag listing failed, in listing order
    pub failed_listings: Vec<String>,
}

impl Discovery {
    /// Number of `{repository, tag}` pairs
    pub fn image_count(&self) -> usize {
        self.tags.values().map(Vec::len).sum()
    }
}

/// List the owner's repositories, then the tags of each.
///
/// Failing to enumerate repositories is fatal. A repository whose tags cannot be listed is
/// recorded in [`Discovery::failed_listings`] and skipped.
pub async fn discover(
    registry: &dyn RegistryClient,
    owner: &str,
    output: &Logger,
) -> Result<Discovery> {
    let repositories = registry.list_repositories(owner).await.map_err(|e| {
        output.error(&format!("list repos ({}) failed, error: {}", owner, e));
        e
    })?;
    output.info(&format!(
        "Found {} repositories under {}",
        repositories.len(),
        owner
    ));
    output.verbose(&format!("repos got: {}", repositories.join(", ")));

    let mut discovery = Discovery::default();
    for repository in repositories {
        match registry.list_tags(&repository).await {
            Ok(tags) => {
                output.detail(&format!("{}: {} tags", repository, tags.len()));
                discovery.tags.insert(repository, tags);
            }
            Err(e) => {
                output.error(&format!(
                    "list tag of repo ({}) fails, error: {}",
                    repository, e
                ));
                discovery.failed_listings.push(repository);
            }
        }
    }

    output.verbose(&format!(
        "images found in source registry: {:?}",
        discovery.tags
    ));
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiVersion;
    use crate::error::SyncError;
    use async_trait::async_trait;

    struct StaticRegistry {
        repositories: Result<Vec<String>>,
        tags: HashMap<String, Result<Vec<String>>>,
    }

    #[async_trait]
    impl RegistryClient for StaticRegistry {
        fn api(&self) -> ApiVersion {
            ApiVersion::Hub
        }

        async fn list_repositories(&self, _owner: &str) -> Result<Vec<String>> {
            self.repositories.clone()
        }

        async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
            self.tags
                .get(repository)
                .cloned()
                .unwrap_or_else(|| Err(SyncError::NotFound(repository.to_string())))
        }
    }

    #[tokio::test]
    async fn test_failed_listing_recorded_others_kept() {
        let registry = StaticRegistry {
            repositories: Ok(vec!["ubuntu".into(), "broken".into(), "alpine".into()]),
            tags: HashMap::from([
                ("ubuntu".to_string(), Ok(vec!["latest".to_string(), "14.04".to_string()])),
                ("broken".to_string(), Err(SyncError::Network("timeout".into()))),
                ("alpine".to_string(), Ok(vec!["3.9".to_string()])),
            ]),
        };

        let discovery = discover(&registry, "library", &Logger::new_quiet())
            .await
            .unwrap();
        assert_eq!(discovery.failed_listings, vec!["broken"]);
        assert_eq!(discovery.tags.len(), 2);
        assert_eq!(discovery.tags["ubuntu"], vec!["latest", "14.04"]);
        assert_eq!(discovery.image_count(), 3);
    }

    #[tokio::test]
    async fn test_repository_enumeration_failure_is_fatal() {
        let registry = StaticRegistry {
            repositories: Err(SyncError::Unsupported("no search".into())),
            tags: HashMap::new(),
        };
        let result = discover(&registry, "acme", &Logger::new_quiet()).await;
        assert!(matches!(result, Err(SyncError::Unsupported(_))));
    }
}
