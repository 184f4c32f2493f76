//! Stage workers
//!
//! Each stage is one spawned task reading its input channel and writing its output channel.
//! Items are handled one at a time in arrival order. A stage reserves the downstream slot before
//! it invokes the image tool, so at most one finished item waits at each boundary. A stage
//! closes its output by dropping the sender once its input is exhausted, which shuts the next
//! stage down in turn. The join handle of every stage yields the number of items it dropped.

use crate::executor::ImageExecutor;
use crate::image::ImageRef;
use crate::logging::Logger;
use crate::pipeline::cleanup::CleanupTasks;
use crate::pipeline::discovery::RepositoryTagMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Items held between two stages. Producers reserve this slot before doing the work for an item.
pub const HANDOFF_CAPACITY: usize = 1;

/// Output side of a running stage
pub struct Stage {
    pub output: mpsc::Receiver<ImageRef>,
    pub handle: JoinHandle<usize>,
}

/// Destination naming for the retag stage
#[derive(Debug, Clone)]
pub struct RetagTarget {
    pub registry: String,
    pub owner: String,
}

impl RetagTarget {
    pub fn new(registry: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            owner: owner.into(),
        }
    }

    /// Source images with a registry keep their repository path; default-namespace images
    /// move under the destination owner.
    pub fn destination_for(&self, source: &ImageRef) -> ImageRef {
        let repository = if source.has_registry() {
            source.repository.clone()
        } else {
            format!("{}/{}", self.owner, source.repository)
        };
        ImageRef::new(self.registry.clone(), repository, source.tag.clone())
    }
}

/// Expand the tag map into one item per `{repository, tag}` pair.
///
/// The handle yields the number of items emitted.
pub fn emit_images(tags: RepositoryTagMap, registry: String) -> Stage {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut emitted = 0;
        for (repository, repo_tags) in tags {
            for tag in repo_tags {
                let image = ImageRef::new(registry.clone(), repository.clone(), tag);
                if tx.send(image).await.is_err() {
                    return emitted;
                }
                emitted += 1;
            }
        }
        emitted
    });
    Stage { output: rx, handle }
}

pub fn pull_images(
    executor: Arc<dyn ImageExecutor>,
    mut input: mpsc::Receiver<ImageRef>,
    output: Logger,
) -> Stage {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut failures = 0;
        while let Some(image) = input.recv().await {
            let Ok(permit) = tx.reserve().await else {
                output.warning("Retag stage stopped, pull stage exiting");
                break;
            };
            output.step(&format!("Pulling {}", image));
            match executor.pull(&image).await {
                Ok(_) => permit.send(image),
                Err(e) => {
                    failures += 1;
                    output.error(&format!(
                        "pull image {} failed, stderr: {}, error: {}",
                        image,
                        e.diagnostics().unwrap_or_default(),
                        e
                    ));
                }
            }
        }
        failures
    });
    Stage { output: rx, handle }
}

/// Tag every pulled image with its destination name and drop the source name.
///
/// The source name is deleted whether or not tagging succeeded.
pub fn retag_images(
    executor: Arc<dyn ImageExecutor>,
    mut input: mpsc::Receiver<ImageRef>,
    target: RetagTarget,
    output: Logger,
) -> Stage {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut failures = 0;
        while let Some(source) = input.recv().await {
            let Ok(permit) = tx.reserve().await else {
                output.warning("Push stage stopped, retag stage exiting");
                delete_source(executor.as_ref(), &source, &output).await;
                break;
            };
            let destination = target.destination_for(&source);
            output.step(&format!("Tagging {} as {}", source, destination));
            let tagged = executor.tag(&source, &destination).await;
            delete_source(executor.as_ref(), &source, &output).await;

            match tagged {
                Ok(_) => permit.send(destination),
                Err(e) => {
                    failures += 1;
                    output.error(&format!(
                        "tag image {} to {} failed, stderr: {}, error: {}",
                        source,
                        destination,
                        e.diagnostics().unwrap_or_default(),
                        e
                    ));
                }
            }
        }
        failures
    });
    Stage { output: rx, handle }
}

async fn delete_source(executor: &dyn ImageExecutor, source: &ImageRef, output: &Logger) {
    if let Err(e) = executor.delete(source).await {
        output.error(&format!(
            "delete image {} fails, stderr: {}, error: {}",
            source,
            e.diagnostics().unwrap_or_default(),
            e
        ));
    }
}

/// Push every retagged image; a failed push schedules a detached delete of the local copy
pub fn push_images(
    executor: Arc<dyn ImageExecutor>,
    mut input: mpsc::Receiver<ImageRef>,
    cleanup: CleanupTasks,
    output: Logger,
) -> Stage {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut failures = 0;
        while let Some(image) = input.recv().await {
            let Ok(permit) = tx.reserve().await else {
                output.warning("Completion stopped, push stage exiting");
                cleanup.spawn_delete(executor.clone(), image, output.clone());
                break;
            };
            output.step(&format!("Pushing {}", image));
            match executor.push(&image).await {
                Ok(_) => permit.send(image),
                Err(e) => {
                    failures += 1;
                    output.error(&format!(
                        "push image {} failed, stderr: {}, error: {}",
                        image,
                        e.diagnostics().unwrap_or_default(),
                        e
                    ));
                    cleanup.spawn_delete(executor.clone(), image, output.clone());
                }
            }
        }
        failures
    });
    Stage { output: rx, handle }
}
