//! Detached compensating deletes
//!
//! A failed push leaves the destination-tagged copy on disk. Its removal is spawned as a
//! separate task so the push stage can move on; nobody waits for it unless
//! [`CleanupTasks::wait`] is called, and a task still running when the process exits is lost.

use crate::executor::ImageExecutor;
use crate::image::ImageRef;
use crate::logging::Logger;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
pub struct CleanupTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CleanupTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a best-effort delete of `image`; its failure is only logged
    pub fn spawn_delete(&self, executor: Arc<dyn ImageExecutor>, image: ImageRef, output: Logger) {
        let handle = tokio::spawn(async move {
            if let Err(e) = executor.delete(&image).await {
                output.error(&format!(
                    "delete image {} fails, stderr: {}, error: {}",
                    image,
                    e.diagnostics().unwrap_or_default(),
                    e
                ));
            }
        });
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
    }

    /// Cleanups spawned and not yet finished
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or_default()
    }

    /// Await every cleanup spawned so far
    pub async fn wait(&self) {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => return,
        };
        futures::future::join_all(handles).await;
    }
}
