//! Supervised background tasks.
//!
//! A background task's outcome is never lost: it is logged when the task ends
//! and handed to whoever joins the handle.

use std::future::Future;

use anyhow::Result;
use tokio::task::JoinHandle;

/// Handle to a task started with [`spawn_supervised`].
#[derive(Debug)]
pub struct Supervised<T> {
    name: String,
    handle: JoinHandle<Result<T>>,
}

/// Spawn `fut` on the runtime, logging its failure under `name`.
pub fn spawn_supervised<T, F>(name: impl Into<String>, fut: F) -> Supervised<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let name = name.into();
    let task_name = name.clone();
    let handle = tokio::spawn(async move {
        tracing::debug!(task = %task_name, "background task started");
        let result = fut.await;
        match &result {
            Ok(_) => tracing::debug!(task = %task_name, "background task finished"),
            Err(e) => tracing::error!(task = %task_name, error = %format!("{:#}", e), "background task failed"),
        }
        result
    });
    Supervised { name, handle }
}

impl<T> Supervised<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task. A panic or abort becomes an error.
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(task = %self.name, error = %e, "background task did not complete");
                Err(anyhow::anyhow!("task {} did not complete: {}", self.name, e))
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
