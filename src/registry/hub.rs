//! Hub search/tags API client
//!
//! Repository discovery goes through `/v2/search/repositories/` and tag listing through
//! `/v2/repositories/{repo}/tags/`, both paginated with a `next` link in the body.

use crate::config::{ApiVersion, DEFAULT_OWNER, RegistryConfig, validate_owner};
use crate::error::handlers::HttpErrorHandler;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::paging::PageGuard;
use crate::registry::transport::{GetRequest, RegistryTransport};
use crate::registry::{RegistryClient, is_default_owner, is_owned_by};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

pub const HUB_URL: &str = "https://hub.docker.com";
const PAGE_SIZE: usize = 20;

/// One search result
#[derive(Debug, Clone, Deserialize)]
pub struct HubRepository {
    pub repo_name: String,
    #[serde(default)]
    pub is_official: bool,
}

#[derive(Debug, Deserialize)]
struct HubPage<T> {
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubTag {
    pub name: String,
}

pub struct HubClient {
    transport: Arc<dyn RegistryTransport>,
    base_url: String,
    max_pages: usize,
    output: Logger,
}

impl HubClient {
    pub fn new(config: &RegistryConfig, transport: Arc<dyn RegistryTransport>, output: Logger) -> Self {
        Self {
            transport,
            base_url: HUB_URL.to_string(),
            max_pages: config.max_pages,
            output,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, owner: &str, page: usize) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/v2/search/repositories/", self.base_url),
            &[
                ("page", page.to_string()),
                ("query", owner.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ],
        )?)
    }

    fn tags_url(&self, repository: &str, page: usize) -> String {
        format!(
            "{}/v2/repositories/{}/tags/?page={}&page_size={}",
            self.base_url, repository, page, PAGE_SIZE
        )
    }

    async fn fetch_page<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        operation: &str,
    ) -> Result<HubPage<T>> {
        let response = self.transport.get(GetRequest::new(url)).await?;
        if !response.is_success() {
            return Err(HttpErrorHandler::handle_registry_error(
                response.status,
                &response.body,
                operation,
            ));
        }
        response.json()
    }

    /// Hub repositories qualify bare names into the `library` namespace
    pub fn qualify(repository: &str) -> String {
        let repository = repository.trim_matches('/');
        if repository.contains('/') {
            repository.to_string()
        } else {
            format!("{}/{}", DEFAULT_OWNER, repository)
        }
    }
}

#[async_trait]
impl RegistryClient for HubClient {
    fn api(&self) -> ApiVersion {
        ApiVersion::Hub
    }

    async fn list_repositories(&self, owner: &str) -> Result<Vec<String>> {
        validate_owner(owner)?;
        let owner = if owner.is_empty() { DEFAULT_OWNER } else { owner };
        let official_only = is_default_owner(owner);

        let mut repositories = Vec::new();
        let mut guard = PageGuard::new(self.max_pages);
        let mut page = 1;

        loop {
            if let Err(stop) = guard.admit(&page.to_string()) {
                self.output
                    .warning(&format!("Stopped searching repositories of {}: {}", owner, stop));
                break;
            }

            let url = self.search_url(owner, page)?;
            let result: HubPage<HubRepository> =
                match self.fetch_page(url.as_str(), "repository search").await {
                    Ok(result) => result,
                    Err(e) if page == 1 => return Err(e),
                    Err(e) => {
                        self.output.warning(&format!(
                            "Search page {} for {} failed, keeping {} repositories found so far: {}",
                            page,
                            owner,
                            repositories.len(),
                            e
                        ));
                        break;
                    }
                };

            self.output.detail(&format!(
                "Search page {} for {}: {} results",
                page,
                owner,
                result.results.len()
            ));

            repositories.extend(
                result
                    .results
                    .into_iter()
                    .filter(|repo| {
                        if official_only {
                            repo.is_official
                        } else {
                            is_owned_by(&repo.repo_name, owner)
                        }
                    })
                    .map(|repo| repo.repo_name),
            );

            match result.next {
                Some(next) if !next.is_empty() => page += 1,
                _ => break,
            }
        }

        Ok(repositories)
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let repository = Self::qualify(repository);
        let mut tags = Vec::new();
        let mut guard = PageGuard::new(self.max_pages);
        let mut page = 1;

        loop {
            if let Err(stop) = guard.admit(&page.to_string()) {
                self.output
                    .warning(&format!("Stopped listing tags of {}: {}", repository, stop));
                break;
            }

            let url = self.tags_url(&repository, page);
            let result: HubPage<HubTag> = self.fetch_page(&url, "tag listing").await.map_err(|e| {
                self.output
                    .error(&format!("Failed to fetch tags, url: {}, error: {}", url, e));
                e
            })?;
            tags.extend(result.results.into_iter().map(|tag| tag.name));

            match result.next {
                Some(next) if !next.is_empty() => page += 1,
                _ => break,
            }
        }

        self.output
            .detail(&format!("Found {} tags for repository {}", tags.len(), repository));
        Ok(tags)
    }
}
