//! Local image tool invocation
//!
//! Every operation is one out-of-process call of the image tool with stdout and stderr
//! captured. Nothing is retried here.

pub mod docker;

use crate::error::Result;
use crate::image::{ImageRef, LocalInventory};
use async_trait::async_trait;

pub use docker::DockerCli;

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Pull, push, retag and delete images in the local image store.
///
/// Failures are reported as [`crate::error::SyncError::ToolInvocation`] carrying the captured
/// output.
#[async_trait]
pub trait ImageExecutor: Send + Sync {
    async fn pull(&self, image: &ImageRef) -> Result<ToolOutput>;

    async fn push(&self, image: &ImageRef) -> Result<ToolOutput>;

    /// Give the local image `from` the additional name `to`
    async fn tag(&self, from: &ImageRef, to: &ImageRef) -> Result<ToolOutput>;

    /// Remove the local name `image`
    async fn delete(&self, image: &ImageRef) -> Result<ToolOutput>;

    /// Local repositories and their tags
    async fn list_local(&self) -> Result<LocalInventory>;
}
