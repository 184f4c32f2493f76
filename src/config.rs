//! Configuration for a synchronization run
//!
//! Everything is decided once at startup and handed by reference to the registry clients,
//! the image tool executor and the pipeline.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Owner used when the source owner is empty
pub const DEFAULT_OWNER: &str = "library";
/// Destination namespace that default-owner images are remapped into
pub const DEFAULT_OWNER_DESTINATION: &str = "docker_library";
/// Host served by the hub search/tags API
pub const HUB_INDEX_HOST: &str = "index.docker.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Registry API dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    Hub,
    V1,
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::Hub => write!(f, "hub"),
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for ApiVersion {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hub" => Ok(ApiVersion::Hub),
            "v1" => Ok(ApiVersion::V1),
            "v2" => Ok(ApiVersion::V2),
            other => Err(SyncError::InvalidArgument(format!(
                "Registry version must be one of: hub, v1, v2 (got '{}')",
                other
            ))),
        }
    }
}

/// Credentials for one registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    /// Username/password pair when both are present and non-empty
    pub fn basic(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// One side of the synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry host, empty for the hub
    pub host: String,
    pub api: ApiVersion,
    pub scheme: String,
    /// Owner whose repositories are listed (source) or prefixed (destination)
    pub owner: String,
    pub auth: AuthConfig,
    pub skip_tls: bool,
    pub timeout: u64,
    /// Ceiling on pages fetched by any single listing call
    pub max_pages: usize,
}

impl RegistryConfig {
    /// Picks the hub dialect for an empty host or the hub index, the given version otherwise
    pub fn new(host: impl Into<String>, api: ApiVersion, owner: impl Into<String>) -> Self {
        let host = host.into().trim().trim_matches('/').to_string();
        let api = if host.is_empty() || host == HUB_INDEX_HOST {
            ApiVersion::Hub
        } else {
            api
        };
        Self {
            host,
            api,
            scheme: "https".to_string(),
            owner: owner.into(),
            auth: AuthConfig::default(),
            skip_tls: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// `scheme://host`, without trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api != ApiVersion::Hub && self.host.is_empty() {
            return Err(SyncError::InvalidArgument(
                "Registry host cannot be empty for v1/v2 registries".to_string(),
            ));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(SyncError::InvalidArgument(format!(
                "Invalid scheme: {}. Must be http or https",
                self.scheme
            )));
        }
        if self.timeout == 0 {
            return Err(SyncError::InvalidArgument(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(SyncError::InvalidArgument(
                "max_pages must be greater than 0".to_string(),
            ));
        }
        validate_owner(&self.owner)
    }
}

/// Owners are bare names, never `owner/repo`
pub fn validate_owner(owner: &str) -> Result<()> {
    if owner.contains('/') {
        return Err(SyncError::InvalidArgument(format!(
            "Owner '{}' must not contain '/': pass a bare owner name",
            owner
        )));
    }
    Ok(())
}

/// Local image tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub docker_bin: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
        }
    }
}

/// Pipeline behaviour switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Await detached push-failure cleanups before the run returns
    pub wait_for_cleanup: bool,
    /// Keep the local destination copy after a successful push
    pub keep_pushed: bool,
    /// Inspect the local image store for leftovers once the run is over
    pub check_leftovers: bool,
}

/// Complete configuration of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: RegistryConfig,
    pub destination: RegistryConfig,
    pub executor: ExecutorConfig,
    pub pipeline: PipelineConfig,
}

impl SyncConfig {
    /// Applies the default-owner rule: an empty or `library` source owner lists official images
    /// and lands them under `docker_library` on the destination.
    pub fn new(source: RegistryConfig, destination: RegistryConfig) -> Self {
        let mut config = Self {
            source,
            destination,
            executor: ExecutorConfig::default(),
            pipeline: PipelineConfig::default(),
        };
        config.normalize_owners();
        config
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    fn normalize_owners(&mut self) {
        if self.source.owner.is_empty() || self.source.owner == DEFAULT_OWNER {
            self.source.owner = DEFAULT_OWNER.to_string();
            self.destination.owner = DEFAULT_OWNER_DESTINATION.to_string();
        }
    }

    /// Registry segment stamped on discovered source images
    pub fn source_image_registry(&self) -> &str {
        &self.source.host
    }

    /// Registry segment of destination images
    pub fn destination_image_registry(&self) -> &str {
        &self.destination.host
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.destination.validate()?;
        if self.destination.host.is_empty() {
            return Err(SyncError::InvalidArgument(
                "Destination registry host cannot be empty".to_string(),
            ));
        }
        if self.destination.owner.is_empty() {
            return Err(SyncError::InvalidArgument(
                "Destination owner cannot be empty".to_string(),
            ));
        }
        if self.executor.docker_bin.trim().is_empty() {
            return Err(SyncError::InvalidArgument(
                "Image tool binary cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
