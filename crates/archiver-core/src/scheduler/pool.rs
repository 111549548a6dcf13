//! Inter-job worker pool: fixed workers fed by a bounded queue.
//!
//! Keeps up to `workers` jobs running at once; `submit` waits while the queue
//! is full, so a producer walking a large listing never runs far ahead of the
//! downloads.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::control::CancelToken;
use crate::engine::{Engine, JobOutcome};
use crate::error::DownloadError;
use crate::job::ResourceDescriptor;

/// Result of one job run by the pool.
#[derive(Debug)]
pub struct JobReport {
    pub descriptor: ResourceDescriptor,
    pub result: Result<JobOutcome, DownloadError>,
}

/// Summary returned by [`DownloadPool::finish`].
#[derive(Debug, Default)]
pub struct PoolReport {
    pub jobs: Vec<JobReport>,
}

impl PoolReport {
    pub fn downloaded(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.result, Ok(JobOutcome::Downloaded { .. })))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.result, Ok(JobOutcome::AlreadyPresent { .. })))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.result.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

/// Available parallelism minus one, at least 1.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// A running pool. Dropping it without [`finish`](Self::finish) aborts the workers.
pub struct DownloadPool {
    tx: mpsc::Sender<ResourceDescriptor>,
    workers: JoinSet<Vec<JobReport>>,
}

impl DownloadPool {
    /// Spawn `workers` workers sharing a queue of `queue_capacity` descriptors.
    pub fn start(
        engine: Arc<Engine>,
        workers: usize,
        queue_capacity: usize,
        cancel: CancelToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<ResourceDescriptor>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    // Hold the lock only while waiting for the next job.
                    let next = rx.lock().await.recv().await;
                    let Some(descriptor) = next else {
                        break;
                    };
                    let result = if cancel.is_cancelled() {
                        Err(DownloadError::Cancelled)
                    } else {
                        engine.run(&descriptor, &cancel).await
                    };
                    tracing::debug!(worker, url = %descriptor.url, ok = result.is_ok(), "pool job finished");
                    done.push(JobReport { descriptor, result });
                }
                done
            });
        }

        Self { tx, workers: set }
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, descriptor: ResourceDescriptor) -> Result<()> {
        self.tx
            .send(descriptor)
            .await
            .map_err(|_| anyhow::anyhow!("download pool is closed"))
    }

    /// Close the queue, wait for every queued job and return the reports.
    pub async fn finish(self) -> Result<PoolReport> {
        let DownloadPool { tx, mut workers } = self;
        drop(tx);

        let mut report = PoolReport::default();
        while let Some(res) = workers.join_next().await {
            let jobs = res.map_err(|e| anyhow::anyhow!("pool worker join: {}", e))?;
            report.jobs.extend(jobs);
        }
        Ok(report)
    }
}
