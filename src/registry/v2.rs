//! Registry protocol v2 client
//!
//! Protocol v2 has no search endpoint, so repository listing is reported as unsupported.
//! Tag listing walks `/v2/{name}/tags/list` following `Link` headers, negotiating a bearer token
//! when the registry challenges the request.

use crate::config::{ApiVersion, AuthConfig, RegistryConfig, validate_owner};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::auth::Auth;
use crate::registry::paging::{PageGuard, parse_link_next, resolve_next};
use crate::registry::transport::{Authorization, GetRequest, RegistryTransport, TransportResponse};
use crate::registry::RegistryClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub struct V2Client {
    transport: Arc<dyn RegistryTransport>,
    base_url: String,
    auth: AuthConfig,
    max_pages: usize,
    token: Mutex<Option<String>>,
    output: Logger,
}

impl V2Client {
    pub fn new(config: &RegistryConfig, transport: Arc<dyn RegistryTransport>, output: Logger) -> Self {
        Self {
            transport,
            base_url: config.base_url(),
            auth: config.auth.clone(),
            max_pages: config.max_pages,
            token: Mutex::new(None),
            output,
        }
    }

    fn current_authorization(&self) -> Option<Authorization> {
        let token = self.token.lock().ok().and_then(|guard| guard.clone());
        token.map(Authorization::Bearer)
    }

    /// GET with the cached token, answering one authentication challenge if needed
    async fn get_authorized(&self, url: &str) -> Result<TransportResponse> {
        let response = self
            .transport
            .get(GetRequest::new(url).authorization(self.current_authorization()))
            .await?;
        if response.status != 401 {
            return Ok(response);
        }

        let challenge = response.header("www-authenticate").unwrap_or_default();
        if let Some(challenge) = Auth::parse_challenge(challenge) {
            self.output.detail(&format!(
                "Auth challenge received: realm={}, service={}",
                challenge.realm, challenge.service
            ));
            let token = Auth::new(self.transport.as_ref(), &self.auth, &self.output)
                .get_token(&challenge)
                .await?;
            if let Ok(mut guard) = self.token.lock() {
                *guard = Some(token.clone());
            }
            return self
                .transport
                .get(GetRequest::new(url).authorization(Some(Authorization::Bearer(token))))
                .await;
        }

        if let Some((username, password)) = self.auth.basic() {
            return self
                .transport
                .get(GetRequest::new(url).authorization(Some(Authorization::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                })))
                .await;
        }

        Ok(response)
    }
}

#[async_trait]
impl RegistryClient for V2Client {
    fn api(&self) -> ApiVersion {
        ApiVersion::V2
    }

    async fn list_repositories(&self, owner: &str) -> Result<Vec<String>> {
        validate_owner(owner)?;
        Err(SyncError::Unsupported(
            "registry v2 does not support repository search".to_string(),
        ))
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let repository = repository.trim_matches('/');
        let mut tags = Vec::new();
        let mut guard = PageGuard::new(self.max_pages);
        let mut next = Some(format!("{}/v2/{}/tags/list", self.base_url, repository));

        while let Some(url) = next.take() {
            if let Err(stop) = guard.admit(&url) {
                self.output
                    .warning(&format!("Stopped listing tags of {}: {}", repository, stop));
                break;
            }

            let response = self.get_authorized(&url).await?;
            if !response.is_success() {
                let err = HttpErrorHandler::handle_registry_error(
                    response.status,
                    &response.body,
                    "tag listing",
                );
                self.output
                    .error(&format!("ListTags failed, error info: {}", err));
                return Err(err);
            }

            let page: TagList = response.json()?;
            tags.extend(page.tags.unwrap_or_default());

            next = response
                .header("link")
                .and_then(parse_link_next)
                .map(|target| resolve_next(&self.base_url, &target));
        }

        self.output.detail(&format!(
            "ListTags v2 succeeds, repo: {}, results: {:?}",
            repository, tags
        ));
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::testing::ScriptedTransport;

    const BASE: &str = "https://v2.test";

    fn client(transport: Arc<ScriptedTransport>) -> V2Client {
        let config = RegistryConfig::new("v2.test", ApiVersion::V2, "acme")
            .with_auth(AuthConfig::new(Some("bob".into()), Some("pw".into())));
        V2Client::new(&config, transport, Logger::new_quiet())
    }

    #[tokio::test]
    async fn test_search_unsupported() {
        let transport = Arc::new(ScriptedTransport::new());
        let v2 = client(transport.clone());
        assert!(matches!(
            v2.list_repositories("acme").await,
            Err(SyncError::Unsupported(_))
        ));
        assert!(matches!(
            v2.list_repositories("acme/api").await,
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tags_follow_link_header() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_with(
            &format!("{}/v2/acme/api/tags/list", BASE),
            200,
            &[("Link", r#"</v2/acme/api/tags/list?n=2&last=b>; rel="next""#)],
            r#"{"name":"acme/api","tags":["a","b"]}"#,
        );
        transport.respond(
            &format!("{}/v2/acme/api/tags/list?n=2&last=b", BASE),
            200,
            r#"{"name":"acme/api","tags":["c"]}"#,
        );

        let tags = client(transport).list_tags("acme/api").await.unwrap();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_repeated_link_stops_pagination() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_with(
            &format!("{}/v2/acme/api/tags/list", BASE),
            200,
            &[("Link", r#"</v2/acme/api/tags/list>; rel="next""#)],
            r#"{"tags":["a"]}"#,
        );
        let tags = client(transport.clone()).list_tags("acme/api").await.unwrap();
        assert_eq!(tags, vec!["a"]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_bearer_challenge_then_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        let url = format!("{}/v2/acme/api/tags/list", BASE);
        transport.respond_with(
            &url,
            401,
            &[(
                "WWW-Authenticate",
                r#"Bearer realm="https://auth.v2.test/token",service="v2.test",scope="repository:acme/api:pull""#,
            )],
            "",
        );
        transport.respond(&url, 200, r#"{"tags":["1.0","latest"]}"#);
        transport.respond(
            "https://auth.v2.test/token?service=v2.test&scope=repository%3Aacme%2Fapi%3Apull",
            200,
            r#"{"access_token":"tok"}"#,
        );

        let tags = client(transport.clone()).list_tags("acme/api").await.unwrap();
        assert_eq!(tags, vec!["1.0", "latest"]);
        let last = transport.requests().pop().unwrap();
        assert_eq!(last.authorization, Some(Authorization::Bearer("tok".to_string())));
    }

    #[tokio::test]
    async fn test_unknown_repository() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &format!("{}/v2/acme/nope/tags/list", BASE),
            404,
            r#"{"errors":[{"code":"NAME_UNKNOWN"}]}"#,
        );
        assert!(matches!(
            client(transport).list_tags("acme/nope").await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_null_tags() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &format!("{}/v2/acme/empty/tags/list", BASE),
            200,
            r#"{"name":"acme/empty","tags":null}"#,
        );
        assert!(client(transport).list_tags("acme/empty").await.unwrap().is_empty());
    }
}
