//! Shutdown coordination for background tasks.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Owns the long-running background tasks and stops them together.
///
/// Each task gets its own subscription to a broadcast channel; `stop`
/// fires it and waits for every task to return.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Vec::new(),
        }
    }

    /// Spawn `task` with a receiver that fires on shutdown.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.tx.subscribe()));
        self.tasks.push((name, handle));
    }

    /// Number of tasks under management.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task and wait for all of them to finish.
    pub async fn stop(self) {
        let _ = self.tx.send(());

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => tracing::debug!(task = name, "Background task stopped"),
                Err(e) => tracing::error!(task = name, error = %e, "Background task failed"),
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
