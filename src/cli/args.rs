//! Command-line argument parsing

use crate::config::{
    ApiVersion, AuthConfig, DEFAULT_MAX_PAGES, DEFAULT_OWNER_DESTINATION, DEFAULT_TIMEOUT_SECS,
    ExecutorConfig, PipelineConfig, RegistryConfig, SyncConfig,
};
use crate::error::Result;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "image-sync")]
#[command(about = "Mirror every repository and tag of an owner from one registry to another")]
#[command(version, author)]
pub struct Args {
    /// Source registry host
    #[arg(
        long = "src-registry",
        default_value = "",
        help = "Registry to sync from; empty or index.docker.io uses the hub API"
    )]
    pub src_registry: String,

    /// Source registry API version
    #[arg(
        long = "src-registry-version",
        default_value = "v2",
        help = "Source registry API: hub, v1 or v2"
    )]
    pub src_registry_version: String,

    #[arg(long = "src-username", help = "Username for the source registry")]
    pub src_username: Option<String>,

    #[arg(long = "src-repo-password", help = "Password for the source registry")]
    pub src_password: Option<String>,

    /// Source owner
    #[arg(
        long = "repo-owner",
        default_value = "library",
        help = "Owner whose repositories are synced; empty or 'library' means official images"
    )]
    pub repo_owner: String,

    #[arg(
        long = "dst-registry",
        default_value = "index.tenxcloud.com",
        help = "Registry to sync to"
    )]
    pub dst_registry: String,

    #[arg(
        long = "dst-registry-version",
        default_value = "v2",
        help = "Destination registry API: hub, v1 or v2"
    )]
    pub dst_registry_version: String,

    #[arg(long = "dst-username", help = "Username for the destination registry")]
    pub dst_username: Option<String>,

    #[arg(long = "dst-repo-password", help = "Password for the destination registry")]
    pub dst_password: Option<String>,

    #[arg(
        long = "dst-repo-owner",
        default_value = DEFAULT_OWNER_DESTINATION,
        help = "Owner that images without a registry are placed under at the destination"
    )]
    pub dst_repo_owner: String,

    #[arg(long = "docker-bin", help = "Image tool binary [default: docker]")]
    pub docker_bin: Option<String>,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        default_value = "false",
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Timeout in seconds for registry requests
    #[arg(
        long = "timeout",
        short = 't',
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Timeout for registry requests in seconds"
    )]
    pub timeout: u64,

    #[arg(
        long = "max-pages",
        default_value_t = DEFAULT_MAX_PAGES,
        help = "Maximum pages fetched by one listing call"
    )]
    pub max_pages: usize,

    #[arg(
        long = "wait-cleanup",
        help = "Wait for cleanup of failed pushes before exiting"
    )]
    pub wait_cleanup: bool,

    #[arg(
        long = "keep-pushed",
        help = "Keep the local copy of each pushed image"
    )]
    pub keep_pushed: bool,

    #[arg(
        long = "check-leftovers",
        help = "List local images left behind by the run"
    )]
    pub check_leftovers: bool,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Fill absent settings from the environment
    pub fn from_env(mut self) -> Self {
        if self.src_password.is_none() {
            self.src_password = std::env::var("IMAGE_SYNC_SRC_PASSWORD").ok();
        }

        if self.dst_password.is_none() {
            self.dst_password = std::env::var("IMAGE_SYNC_DST_PASSWORD").ok();
        }

        if self.docker_bin.is_none() {
            self.docker_bin = std::env::var("IMAGE_SYNC_DOCKER_BIN").ok();
        }

        if !self.quiet && std::env::var("IMAGE_SYNC_VERBOSE").is_ok() {
            self.verbose = true;
        }

        self
    }

    /// Build and validate the run configuration
    pub fn to_config(&self) -> Result<SyncConfig> {
        let source = RegistryConfig::new(
            &self.src_registry,
            self.src_registry_version.parse::<ApiVersion>()?,
            &self.repo_owner,
        )
        .with_auth(AuthConfig::new(
            self.src_username.clone(),
            self.src_password.clone(),
        ))
        .with_skip_tls(self.skip_tls)
        .with_timeout(self.timeout)
        .with_max_pages(self.max_pages);

        let destination = RegistryConfig::new(
            &self.dst_registry,
            self.dst_registry_version.parse::<ApiVersion>()?,
            &self.dst_repo_owner,
        )
        .with_auth(AuthConfig::new(
            self.dst_username.clone(),
            self.dst_password.clone(),
        ))
        .with_skip_tls(self.skip_tls)
        .with_timeout(self.timeout)
        .with_max_pages(self.max_pages);

        let mut executor = ExecutorConfig::default();
        if let Some(binary) = &self.docker_bin {
            executor.docker_bin = binary.clone();
        }

        let config = SyncConfig::new(source, destination)
            .with_executor(executor)
            .with_pipeline(PipelineConfig {
                wait_for_cleanup: self.wait_cleanup,
                keep_pushed: self.keep_pushed,
                check_leftovers: self.check_leftovers,
            });
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("image-sync").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).to_config().unwrap();
        assert_eq!(config.source.api, ApiVersion::Hub);
        assert_eq!(config.source.owner, "library");
        assert_eq!(config.destination.host, "index.tenxcloud.com");
        assert_eq!(config.destination.owner, "docker_library");
        assert_eq!(config.destination.api, ApiVersion::V2);
        assert_eq!(config.executor.docker_bin, "docker");
        assert_eq!(config.source.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(!config.pipeline.wait_for_cleanup);
    }

    #[test]
    fn test_named_owner_keeps_destination_owner() {
        let config = parse(&[
            "--src-registry",
            "gcr.io",
            "--src-registry-version",
            "v1",
            "--repo-owner",
            "google_containers",
            "--dst-repo-owner",
            "mirror",
            "--wait-cleanup",
            "--keep-pushed",
        ])
        .to_config()
        .unwrap();
        assert_eq!(config.source.api, ApiVersion::V1);
        assert_eq!(config.source.host, "gcr.io");
        assert_eq!(config.destination.owner, "mirror");
        assert!(config.pipeline.wait_for_cleanup);
        assert!(config.pipeline.keep_pushed);
    }

    #[test]
    fn test_default_owner_overrides_destination_owner() {
        let config = parse(&["--repo-owner", "", "--dst-repo-owner", "mirror"])
            .to_config()
            .unwrap();
        assert_eq!(config.source.owner, "library");
        assert_eq!(config.destination.owner, "docker_library");
    }

    #[test]
    fn test_invalid_version_rejected() {
        let err = parse(&["--src-registry", "r.test", "--src-registry-version", "v3"])
            .to_config()
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_owner_with_slash_rejected() {
        let err = parse(&["--repo-owner", "acme/api"]).to_config().unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["image-sync", "--quiet", "--verbose"]).is_err());
    }
}
