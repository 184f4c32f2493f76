//! Synchronization pipeline
//!
//! Discovery builds the source tag map once, then every image flows through
//! pull → retag → push workers joined by single-slot channels. Completion drains the push
//! output and assembles the [`SyncReport`].

pub mod cleanup;
pub mod discovery;
pub mod stages;

pub use cleanup::CleanupTasks;
pub use discovery::{Discovery, RepositoryTagMap, discover};
pub use stages::{RetagTarget, Stage};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::executor::ImageExecutor;
use crate::image::{ImageRef, inventory};
use crate::logging::Logger;
use crate::registry::RegistryClient;
use std::sync::Arc;
use std::time::Duration;

/// End-of-run result. There is no overall verdict; callers read the parts they care about.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Images handed to the pipeline by discovery
    pub discovered: usize,
    /// Destination images pushed successfully, in push order
    pub pushed: Vec<ImageRef>,
    /// Repositories whose tags could not be listed
    pub failed_listings: Vec<String>,
    pub pull_failures: usize,
    pub tag_failures: usize,
    pub push_failures: usize,
    /// Failed deletes of pushed images in the completion stage
    pub cleanup_failures: usize,
    /// Push-failure cleanups still running when the report was built
    pub cleanup_pending: usize,
    /// Local copies found by the leftover check
    pub leftovers: Vec<String>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn item_failures(&self) -> usize {
        self.pull_failures + self.tag_failures + self.push_failures
    }

    /// Counter rows of the end-of-run summary
    pub fn counters(&self, output: &Logger) -> Vec<(&'static str, String)> {
        vec![
            ("Discovered", self.discovered.to_string()),
            ("Pushed", self.pushed.len().to_string()),
            ("Pull failures", self.pull_failures.to_string()),
            ("Tag failures", self.tag_failures.to_string()),
            ("Push failures", self.push_failures.to_string()),
            ("Failed deletes of pushed images", self.cleanup_failures.to_string()),
            ("Failed listings", self.failed_listings.len().to_string()),
            ("Duration", output.format_duration(self.duration)),
        ]
    }

    pub fn print(&self, output: &Logger) {
        output.section("Sync Summary");
        output.summary_kv("Results", &self.counters(output));
        output.list(
            "Pushed images",
            &self.pushed.iter().map(ImageRef::canonical).collect::<Vec<_>>(),
        );
        if !self.failed_listings.is_empty() {
            output.list("Repositories failed to list tags", &self.failed_listings);
        }
        if self.cleanup_pending > 0 {
            output.warning(&format!(
                "{} cleanup(s) of failed pushes still running",
                self.cleanup_pending
            ));
        }
        if !self.leftovers.is_empty() {
            output.list("Local images left behind", &self.leftovers);
        }
    }
}

pub struct SyncPipeline<'a> {
    config: &'a SyncConfig,
    executor: Arc<dyn ImageExecutor>,
    output: Logger,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(config: &'a SyncConfig, executor: Arc<dyn ImageExecutor>, output: Logger) -> Self {
        Self {
            config,
            executor,
            output,
        }
    }

    /// Discover the source owner's images and sync all of them.
    ///
    /// Only a failure to enumerate the source repositories is returned as an error.
    pub async fn run(&self, source: &dyn RegistryClient) -> Result<SyncReport> {
        self.output.section("Discovering source images");
        let discovery = discover(source, &self.config.source.owner, &self.output).await?;
        Ok(self.sync(discovery).await)
    }

    /// Push every image of an already built discovery
    pub async fn sync(&self, discovery: Discovery) -> SyncReport {
        let started = std::time::Instant::now();
        self.output.section("Syncing images");
        self.output.info(&format!(
            "{} images from {} repositories",
            discovery.image_count(),
            discovery.tags.len()
        ));

        let target = RetagTarget::new(
            self.config.destination_image_registry(),
            self.config.destination.owner.clone(),
        );
        let source_registry = self.config.source_image_registry().to_string();
        let cleanup = CleanupTasks::new();

        let expected = if self.config.pipeline.check_leftovers {
            expected_names(&discovery.tags, &source_registry, &target)
        } else {
            Vec::new()
        };

        let emitted = stages::emit_images(discovery.tags, source_registry);
        let pulled = stages::pull_images(self.executor.clone(), emitted.output, self.output.clone());
        let tagged = stages::retag_images(
            self.executor.clone(),
            pulled.output,
            target,
            self.output.clone(),
        );
        let pushed = stages::push_images(
            self.executor.clone(),
            tagged.output,
            cleanup.clone(),
            self.output.clone(),
        );

        let mut report = SyncReport {
            failed_listings: discovery.failed_listings,
            ..SyncReport::default()
        };
        self.complete(pushed.output, &mut report).await;

        report.discovered = self.join("discovery", emitted.handle).await;
        report.pull_failures = self.join("pull", pulled.handle).await;
        report.tag_failures = self.join("retag", tagged.handle).await;
        report.push_failures = self.join("push", pushed.handle).await;

        if self.config.pipeline.wait_for_cleanup {
            self.output.detail("Waiting for cleanup of failed pushes");
            cleanup.wait().await;
        }
        report.cleanup_pending = cleanup.pending();

        if self.config.pipeline.check_leftovers {
            report.leftovers = self.find_leftovers(&expected).await;
        }

        report.duration = started.elapsed();
        report
    }

    /// Drain the push output, removing each pushed local copy unless configured to keep it
    async fn complete(
        &self,
        mut pushed: tokio::sync::mpsc::Receiver<ImageRef>,
        report: &mut SyncReport,
    ) {
        while let Some(image) = pushed.recv().await {
            self.output.success(&format!("Pushed {}", image));
            if !self.config.pipeline.keep_pushed {
                if let Err(e) = self.executor.delete(&image).await {
                    report.cleanup_failures += 1;
                    self.output.error(&format!(
                        "delete image {} fails, stderr: {}, error: {}",
                        image,
                        e.diagnostics().unwrap_or_default(),
                        e
                    ));
                }
            }
            report.pushed.push(image);
        }
    }

    async fn join(&self, stage: &str, handle: tokio::task::JoinHandle<usize>) -> usize {
        match handle.await {
            Ok(count) => count,
            Err(e) => {
                self.output
                    .error(&format!("{} stage terminated abnormally: {}", stage, e));
                0
            }
        }
    }

    async fn find_leftovers(&self, expected: &[ImageRef]) -> Vec<String> {
        let local = match self.executor.list_local().await {
            Ok(local) => local,
            Err(e) => {
                self.output
                    .warning(&format!("Skipping leftover check: {}", e));
                return Vec::new();
            }
        };

        let leftovers: Vec<String> = expected
            .iter()
            .filter(|image| inventory::contains(&local, &image.local_repository(), &image.tag))
            .map(ImageRef::canonical)
            .collect();
        for image in &leftovers {
            self.output.warning(&format!("Local image left behind: {}", image));
        }
        leftovers
    }
}

/// Every source and destination name the run may have created locally
fn expected_names(tags: &RepositoryTagMap, source_registry: &str, target: &RetagTarget) -> Vec<ImageRef> {
    let mut names = Vec::new();
    for (repository, repo_tags) in tags {
        for tag in repo_tags {
            let source = ImageRef::new(source_registry, repository.clone(), tag.clone());
            names.push(target.destination_for(&source));
            names.push(source);
        }
    }
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_expected_names_cover_both_sides() {
        let tags: RepositoryTagMap =
            HashMap::from([("ubuntu".to_string(), vec!["latest".to_string()])]);
        let target = RetagTarget::new("index.tenxcloud.com", "docker_library");
        let names: Vec<String> = expected_names(&tags, "", &target)
            .iter()
            .map(ImageRef::canonical)
            .collect();
        assert_eq!(
            names,
            vec![
                "ubuntu:latest",
                "index.tenxcloud.com/docker_library/ubuntu:latest"
            ]
        );
    }

    #[test]
    fn test_item_failures_sum() {
        let report = SyncReport {
            pull_failures: 1,
            tag_failures: 2,
            push_failures: 3,
            ..SyncReport::default()
        };
        assert_eq!(report.item_failures(), 6);
    }

    #[test]
    fn test_counters_include_failed_pushed_deletes() {
        let report = SyncReport {
            cleanup_failures: 2,
            ..SyncReport::default()
        };
        let counters = report.counters(&Logger::new_quiet());
        assert!(counters.contains(&("Failed deletes of pushed images", "2".to_string())));
    }
}
