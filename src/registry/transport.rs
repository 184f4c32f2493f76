//! HTTP transport used by the registry clients
//!
//! The backends only ever issue GET requests and inspect status, headers and body, so the
//! transport is reduced to that single operation. [`HttpTransport`] is the reqwest-backed
//! implementation; tests substitute a scripted one.

use crate::config::RegistryConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

/// Authorization attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
    /// Protocol-v1 `Authorization: Token ...`
    Token(String),
}

/// GET request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub authorization: Option<Authorization>,
}

impl GetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            authorization: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn authorization(mut self, authorization: Option<Authorization>) -> Self {
        self.authorization = authorization;
        self
    }
}

/// Response data, header names lower-cased
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| SyncError::Parse(format!("Failed to parse registry response: {}", e)))
    }
}

#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn get(&self, request: GetRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let builder = Client::builder().timeout(Duration::from_secs(config.timeout));
        let builder = if config.skip_tls {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
        } else {
            builder
        };
        let client = builder
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn get(&self, request: GetRequest) -> Result<TransportResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.authorization {
            Some(Authorization::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Authorization::Bearer(token)) => builder.bearer_auth(token),
            Some(Authorization::Token(token)) => {
                builder.header("Authorization", format!("Token {}", token))
            }
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
