//! Registry protocol v1 client
//!
//! Search is paged through `/v1/search`, and tag listing needs a read token obtained with the
//! `X-Docker-Token` handshake on the repository's image index.

use crate::config::{ApiVersion, AuthConfig, DEFAULT_OWNER, RegistryConfig, validate_owner};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::paging::PageGuard;
use crate::registry::transport::{Authorization, GetRequest, RegistryTransport, TransportResponse};
use crate::registry::{RegistryClient, is_default_owner, is_owned_by};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

const SEARCH_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    num_pages: usize,
    #[serde(default = "Vec::new")]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    #[serde(default)]
    is_official: bool,
}

/// Read access granted by the token handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadToken {
    pub token: Option<String>,
    /// Base URL that serves the repository, from `X-Docker-Endpoints`
    pub endpoint: String,
}

pub struct V1Client {
    transport: Arc<dyn RegistryTransport>,
    base_url: String,
    scheme: String,
    auth: AuthConfig,
    max_pages: usize,
    output: Logger,
}

impl V1Client {
    pub fn new(config: &RegistryConfig, transport: Arc<dyn RegistryTransport>, output: Logger) -> Self {
        Self {
            transport,
            base_url: config.base_url(),
            scheme: config.scheme.clone(),
            auth: config.auth.clone(),
            max_pages: config.max_pages,
            output,
        }
    }

    fn search_url(&self, pattern: &str, page: usize) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/v1/search", self.base_url),
            &[
                ("q", pattern.to_string()),
                ("n", SEARCH_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ],
        )?)
    }

    async fn search_page(&self, pattern: &str, page: usize) -> Result<SearchResults> {
        let url = self.search_url(pattern, page)?;
        let response = self.transport.get(GetRequest::new(url.as_str())).await?;
        check_status(&response, "repository search")?;
        response.json()
    }

    /// Keep the results that belong to `owner`, in the naming the v1 index uses
    fn select(owner: &str, results: Vec<SearchResult>) -> Vec<String> {
        if is_default_owner(owner) {
            // Official repositories carry no namespace in v1 search results
            results
                .into_iter()
                .filter_map(|r| {
                    if let Some(bare) = r.name.strip_prefix("library/") {
                        Some(format!("{}/{}", DEFAULT_OWNER, bare))
                    } else if !r.name.contains('/') || r.is_official {
                        let bare = r.name.rsplit('/').next().unwrap_or(&r.name).to_string();
                        Some(format!("{}/{}", DEFAULT_OWNER, bare))
                    } else {
                        None
                    }
                })
                .collect()
        } else {
            results
                .into_iter()
                .filter(|r| is_owned_by(&r.name, owner))
                .map(|r| r.name)
                .collect()
        }
    }

    /// `X-Docker-Token` handshake granting read access to `repository`
    pub async fn read_token(&self, repository: &str) -> Result<ReadToken> {
        let url = format!("{}/v1/repositories/{}/images", self.base_url, repository);
        let authorization = self.auth.basic().map(|(username, password)| Authorization::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
        let response = self
            .transport
            .get(
                GetRequest::new(&url)
                    .header("X-Docker-Token", "true")
                    .authorization(authorization),
            )
            .await?;
        check_status(&response, "read token request").map_err(|e| {
            self.output
                .error(&format!("GetReadToken failed for {}: {}", repository, e));
            e
        })?;

        let endpoint = response
            .header("x-docker-endpoints")
            .and_then(|endpoints| endpoints.split(',').map(str::trim).find(|e| !e.is_empty()))
            .map(|endpoint| {
                if endpoint.contains("://") {
                    endpoint.trim_end_matches('/').to_string()
                } else {
                    format!("{}://{}", self.scheme, endpoint.trim_end_matches('/'))
                }
            })
            .unwrap_or_else(|| self.base_url.clone());

        Ok(ReadToken {
            token: response
                .header("x-docker-token")
                .map(str::to_string)
                .filter(|t| !t.is_empty()),
            endpoint,
        })
    }

    /// Tag names from either the map form `{"tag": "image"}` or the list form `[{"name": ..}]`
    fn parse_tags(body: &Value) -> Result<Vec<String>> {
        match body {
            Value::Object(map) => Ok(map.keys().cloned().collect()),
            Value::Array(items) => Ok(items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()),
            other => Err(SyncError::Parse(format!(
                "Unexpected tag listing payload: {}",
                other
            ))),
        }
    }
}

fn check_status(response: &TransportResponse, operation: &str) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(HttpErrorHandler::handle_registry_error(
            response.status,
            &response.body,
            operation,
        ))
    }
}

#[async_trait]
impl RegistryClient for V1Client {
    fn api(&self) -> ApiVersion {
        ApiVersion::V1
    }

    async fn list_repositories(&self, owner: &str) -> Result<Vec<String>> {
        validate_owner(owner)?;
        let pattern = if owner.is_empty() { DEFAULT_OWNER } else { owner };

        let first = self.search_page(pattern, 1).await?;
        let num_pages = first.num_pages;
        let mut repositories = Self::select(pattern, first.results);
        self.output.detail(&format!(
            "ListRepositories {}: {} pages of up to {}",
            pattern, num_pages, SEARCH_PAGE_SIZE
        ));

        let mut guard = PageGuard::new(self.max_pages);
        let _ = guard.admit("1");
        for page in 2..=num_pages {
            if let Err(stop) = guard.admit(&page.to_string()) {
                self.output
                    .warning(&format!("Stopped searching repositories of {}: {}", pattern, stop));
                break;
            }
            match self.search_page(pattern, page).await {
                Ok(results) => repositories.extend(Self::select(pattern, results.results)),
                Err(e) => {
                    self.output.warning(&format!(
                        "Search repo failed, pattern: {}, page: {}, keeping {} repositories: {}",
                        pattern,
                        page,
                        repositories.len(),
                        e
                    ));
                    break;
                }
            }
        }

        Ok(repositories)
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let repository = repository.trim_matches('/');
        let access = self.read_token(repository).await?;

        let url = format!("{}/v1/repositories/{}/tags", access.endpoint, repository);
        let response = self
            .transport
            .get(GetRequest::new(&url).authorization(access.token.map(Authorization::Token)))
            .await?;
        check_status(&response, "tag listing")?;

        let tags = Self::parse_tags(&response.json::<Value>()?)?;
        self.output.detail(&format!(
            "ListTags v1 succeeds, repo: {}, results: {:?}",
            repository, tags
        ));
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::testing::ScriptedTransport;

    const BASE: &str = "https://v1.test";

    fn client(transport: Arc<ScriptedTransport>) -> V1Client {
        let config = RegistryConfig::new("v1.test", ApiVersion::V1, "acme")
            .with_auth(AuthConfig::new(Some("bob".into()), Some("pw".into())));
        V1Client::new(&config, transport, Logger::new_quiet())
    }

    fn search(pattern: &str, page: usize) -> String {
        format!("{}/v1/search?q={}&n=100&page={}", BASE, pattern, page)
    }

    #[tokio::test]
    async fn test_search_all_pages_with_owner_filter() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &search("acme", 1),
            200,
            r#"{"num_pages":2,"page":1,"results":[{"name":"acme/api"},{"name":"acmeish/x"}]}"#,
        );
        transport.respond(
            &search("acme", 2),
            200,
            r#"{"num_pages":2,"page":2,"results":[{"name":"acme/db"}]}"#,
        );

        let repos = client(transport).list_repositories("acme").await.unwrap();
        assert_eq!(repos, vec!["acme/api", "acme/db"]);
    }

    #[tokio::test]
    async fn test_library_keeps_bare_names() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &search("library", 1),
            200,
            r#"{"num_pages":1,"results":[
                {"name":"ubuntu"},
                {"name":"someone/ubuntu"},
                {"name":"library/redis"}]}"#,
        );
        let repos = client(transport).list_repositories("").await.unwrap();
        assert_eq!(repos, vec!["library/ubuntu", "library/redis"]);
    }

    #[tokio::test]
    async fn test_later_page_failure_is_best_effort() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &search("acme", 1),
            200,
            r#"{"num_pages":3,"results":[{"name":"acme/api"}]}"#,
        );
        transport.fail(&search("acme", 2), SyncError::Network("reset".into()));

        let repos = client(transport.clone()).list_repositories("acme").await.unwrap();
        assert_eq!(repos, vec!["acme/api"]);
        assert_eq!(transport.request_count(&search("acme", 3)), 0);
    }

    #[tokio::test]
    async fn test_list_tags_with_token_handshake() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_with(
            &format!("{}/v1/repositories/acme/api/images", BASE),
            200,
            &[
                ("X-Docker-Token", "signature=abc,repository=\"acme/api\",access=read"),
                ("X-Docker-Endpoints", "registry-1.v1.test"),
            ],
            "[]",
        );
        transport.respond(
            "https://registry-1.v1.test/v1/repositories/acme/api/tags",
            200,
            r#"{"latest":"f1e2","1.0":"a0b1"}"#,
        );

        let mut tags = client(transport.clone()).list_tags("acme/api").await.unwrap();
        tags.sort();
        assert_eq!(tags, vec!["1.0", "latest"]);

        let requests = transport.requests();
        assert!(requests[0]
            .headers
            .contains(&("X-Docker-Token".to_string(), "true".to_string())));
        assert_eq!(
            requests[1].authorization,
            Some(Authorization::Token(
                "signature=abc,repository=\"acme/api\",access=read".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_list_tags_list_payload_without_endpoint() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/v1/repositories/acme/db/images", BASE), 200, "[]");
        transport.respond(
            &format!("{}/v1/repositories/acme/db/tags", BASE),
            200,
            r#"[{"name":"9.6","layer":"aa"},{"name":"10","layer":"bb"}]"#,
        );
        let tags = client(transport).list_tags("acme/db").await.unwrap();
        assert_eq!(tags, vec!["9.6", "10"]);
    }

    #[tokio::test]
    async fn test_token_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/v1/repositories/acme/api/images", BASE), 401, "");
        let result = client(transport).list_tags("acme/api").await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
    }
}
