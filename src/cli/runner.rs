//! Runner wiring configuration, registry client, executor and pipeline together

use crate::cli::args::Args;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::executor::{DockerCli, ImageExecutor};
use crate::logging::Logger;
use crate::pipeline::{SyncPipeline, SyncReport};
use crate::registry;
use std::sync::Arc;

pub struct Runner {
    config: SyncConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: &Args) -> Result<Self> {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };
        let config = args.to_config()?;
        Ok(Self { config, output })
    }

    pub async fn run(&self) -> Result<SyncReport> {
        self.output.section("Image Sync");
        self.describe();

        let source = registry::connect(&self.config.source, &self.output)?;
        let executor: Arc<dyn ImageExecutor> =
            Arc::new(DockerCli::new(&self.config.executor, self.output.clone()));

        let report = SyncPipeline::new(&self.config, executor, self.output.clone())
            .run(source.as_ref())
            .await?;

        report.print(&self.output);
        self.output.success(&format!(
            "Sync finished in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(report)
    }

    fn describe(&self) {
        let source = &self.config.source;
        let destination = &self.config.destination;
        self.output.info(&format!(
            "Source: {} ({}), owner {}",
            display_host(&source.host),
            source.api,
            source.owner
        ));
        self.output.info(&format!(
            "Destination: {} ({}), owner {}",
            display_host(&destination.host),
            destination.api,
            destination.owner
        ));
        self.output
            .detail(&format!("Image tool: {}", self.config.executor.docker_bin));
        if destination.auth.basic().is_some() {
            self.output.detail(
                "Pushes use the image tool's own login for the destination registry",
            );
        }
    }
}

fn display_host(host: &str) -> &str {
    if host.is_empty() { "docker hub" } else { host }
}
