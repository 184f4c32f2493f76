//! Bearer token negotiation for protocol-v2 registries

use crate::config::AuthConfig;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::transport::{Authorization, GetRequest, RegistryTransport};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

pub struct Auth<'a> {
    transport: &'a dyn RegistryTransport,
    credentials: &'a AuthConfig,
    output: &'a Logger,
}

impl<'a> Auth<'a> {
    pub fn new(
        transport: &'a dyn RegistryTransport,
        credentials: &'a AuthConfig,
        output: &'a Logger,
    ) -> Self {
        Self {
            transport,
            credentials,
            output,
        }
    }

    /// Parse a Bearer challenge: `Bearer realm="...",service="...",scope="..."`
    pub fn parse_challenge(header: &str) -> Option<AuthChallenge> {
        let params_str = header.strip_prefix("Bearer ")?;
        let mut params = HashMap::new();

        for param in split_params(params_str) {
            if let Some((key, value)) = param.split_once('=') {
                params.insert(key.trim(), value.trim().trim_matches('"'));
            }
        }

        let realm = params.get("realm")?;
        Some(AuthChallenge {
            realm: realm.to_string(),
            service: params.get("service").unwrap_or(&"").to_string(),
            scope: params.get("scope").map(|s| s.to_string()),
        })
    }

    /// Fetch a token answering `challenge`, with basic credentials when configured
    pub async fn get_token(&self, challenge: &AuthChallenge) -> Result<String> {
        let mut url = Url::parse(&challenge.realm)?;
        {
            let mut query = url.query_pairs_mut();
            if !challenge.service.is_empty() {
                query.append_pair("service", &challenge.service);
            }
            if let Some(scope) = &challenge.scope {
                query.append_pair("scope", scope);
            }
        }

        self.output.detail(&format!("Requesting token from: {}", url));

        let authorization = self
            .credentials
            .basic()
            .map(|(username, password)| Authorization::Basic {
                username: username.to_string(),
                password: password.to_string(),
            });
        let response = self
            .transport
            .get(GetRequest::new(url.as_str()).authorization(authorization))
            .await?;

        if !response.is_success() {
            self.output.error(&format!(
                "Token request failed with status {}: {}",
                response.status, response.body
            ));
            return Err(HttpErrorHandler::handle_auth_error(
                response.status,
                &response.body,
            ));
        }

        let token_response: TokenResponse = response.json()?;
        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Token expires in {} seconds", expires_in));
        }
        token_response
            .token
            .or(token_response.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("Token service returned no token".to_string()))
    }
}

// Splits on commas outside quotes; scopes such as `repository:a/b:pull,push` contain commas.
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts
}
