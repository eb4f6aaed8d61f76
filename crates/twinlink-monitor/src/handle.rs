//! Ownership of the background tasks started for one session.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels and joins every task it spawned. Dropping the handle cancels
/// without waiting.
#[derive(Debug, Default)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl MonitorHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token every spawned task should watch.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "spawning monitor task");
        self.tasks.push((name, tokio::spawn(task)));
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signals cancellation and waits for every task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for (name, task) in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "monitor task panicked");
            }
        }
        tracing::debug!("monitor shut down");
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
