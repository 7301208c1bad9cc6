//! Ownership of the long-running background workers.
//!
//! Every worker shares one [`CancellationToken`]. Exits are observable through
//! [`WorkerGroup::next_exit`], so the caller can tell a worker that stopped
//! because it was asked to from one that failed or panicked.

use std::{any::Any, fmt, future::Future, time::Duration};

use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    Completed,
    Failed(String),
    Panicked(String),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerExit {
    pub name: String,
    pub outcome: ExitOutcome,
}

impl WorkerExit {
    /// Anything but a cancellation is unexpected for a worker that loops forever.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self.outcome, ExitOutcome::Cancelled)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ExitOutcome::Completed => write!(f, "{} stopped", self.name),
            ExitOutcome::Failed(e) => write!(f, "{} failed: {e}", self.name),
            ExitOutcome::Panicked(msg) => write!(f, "{} panicked: {msg}", self.name),
            ExitOutcome::Cancelled => write!(f, "{} cancelled", self.name),
        }
    }
}

pub struct WorkerGroup {
    cancel: CancellationToken,
    watchers: JoinSet<WorkerExit>,
    workers: Vec<AbortHandle>,
}

impl Default for WorkerGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerGroup {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            watchers: JoinSet::new(),
            workers: Vec::new(),
        }
    }

    /// Token every worker must race its blocking waits against.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a worker. Must be called from within a tokio runtime.
    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let cancel = self.cancel.clone();

        // The worker runs in its own task so a panic is caught by its JoinHandle
        // and the watcher can report it.
        let worker = tokio::spawn(fut);
        self.workers.push(worker.abort_handle());

        tracing::debug!(worker = %name, "worker started");
        self.watchers.spawn(async move {
            let outcome = match worker.await {
                Ok(Ok(())) if cancel.is_cancelled() => ExitOutcome::Cancelled,
                Ok(Ok(())) => ExitOutcome::Completed,
                Ok(Err(e)) => ExitOutcome::Failed(e.to_string()),
                Err(e) if e.is_panic() => ExitOutcome::Panicked(panic_message(e.into_panic())),
                Err(_) => ExitOutcome::Cancelled,
            };
            WorkerExit { name, outcome }
        });
    }

    /// Wait for the next worker to exit. `None` once every worker has been reaped.
    pub async fn next_exit(&mut self) -> Option<WorkerExit> {
        loop {
            match self.watchers.join_next().await? {
                Ok(exit) => return Some(exit),
                // Watchers only die when the group itself aborts them.
                Err(e) => tracing::debug!("worker watcher ended: {e}"),
            }
        }
    }

    /// Cancel, wait up to `grace` for workers to finish, then abort the rest.
    pub async fn shutdown(mut self, grace: Duration) -> Vec<WorkerExit> {
        self.cancel.cancel();

        let mut exits = Vec::new();
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match tokio::time::timeout_at(deadline, self.next_exit()).await {
                Ok(Some(exit)) => exits.push(exit),
                Ok(None) => return exits,
                Err(_) => break,
            }
        }

        tracing::warn!(
            remaining = self.watchers.len(),
            "grace period elapsed; aborting remaining workers"
        );
        for handle in &self.workers {
            handle.abort();
        }
        while let Some(exit) = self.next_exit().await {
            exits.push(exit);
        }
        exits
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}
