//! `docker` command line executor

use crate::config::ExecutorConfig;
use crate::error::{Result, SyncError};
use crate::executor::{ImageExecutor, ToolOutput};
use crate::image::{ImageRef, LocalInventory, parse_image_table};
use crate::logging::Logger;
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    output: Logger,
}

impl DockerCli {
    pub fn new(config: &ExecutorConfig, output: Logger) -> Self {
        Self {
            binary: config.docker_bin.clone(),
            output,
        }
    }

    /// Run `binary args...`, failing with the captured output on a non-zero exit
    pub async fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        let command = format!("{} {}", self.binary, args.first().copied().unwrap_or_default());
        self.output
            .debug(&format!("exec: {} {}", self.binary, args.join(" ")));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::ToolInvocation {
                command: command.clone(),
                reason: format!("failed to start: {}", e),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        let captured = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(captured)
        } else {
            Err(SyncError::ToolInvocation {
                command,
                reason: output.status.to_string(),
                stdout: captured.stdout,
                stderr: captured.stderr,
            })
        }
    }
}

#[async_trait]
impl ImageExecutor for DockerCli {
    async fn pull(&self, image: &ImageRef) -> Result<ToolOutput> {
        let image = image.canonical();
        self.run(&["pull", image.as_str()]).await
    }

    async fn push(&self, image: &ImageRef) -> Result<ToolOutput> {
        let image = image.canonical();
        self.run(&["push", image.as_str()]).await
    }

    async fn tag(&self, from: &ImageRef, to: &ImageRef) -> Result<ToolOutput> {
        let (from, to) = (from.canonical(), to.canonical());
        self.run(&["tag", from.as_str(), to.as_str()]).await
    }

    async fn delete(&self, image: &ImageRef) -> Result<ToolOutput> {
        let image = image.canonical();
        self.run(&["rmi", image.as_str()]).await
    }

    async fn list_local(&self) -> Result<LocalInventory> {
        let output = self.run(&["images"]).await.map_err(|e| {
            self.output.error(&format!(
                "Listing local images failed, stderr: {}, err: {}",
                e.diagnostics().unwrap_or_default(),
                e
            ));
            e
        })?;
        Ok(parse_image_table(&output.stdout))
    }
}
