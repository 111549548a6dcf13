//! Archive-level workflows built from the engine, discovery and the catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::catalog::{relative_path, ArchiveRecord, ArchiveStatus, DownloadStatus, DownloadStore, NewDownload};
use crate::config::ArchiverConfig;
use crate::control::CancelToken;
use crate::discovery::Discovery;
use crate::engine::{Engine, JobOutcome};
use crate::job::ResourceDescriptor;
use crate::reconcile::{self, RescanReport};
use crate::scheduler::{default_worker_count, DownloadPool, PoolReport};

/// Pool sizing for the archive workflows.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl PoolSettings {
    pub fn from_config(cfg: &ArchiverConfig) -> Self {
        Self {
            workers: cfg.workers.unwrap_or_else(default_worker_count),
            queue_capacity: cfg.queue_capacity,
        }
    }
}

/// Record every resource `discovery` yields as a download of `archive`, then
/// mark the archive `pending`. Returns how many downloads were recorded.
pub async fn populate_archive(
    store: &dyn DownloadStore,
    archive: &ArchiveRecord,
    mut discovery: Discovery,
) -> Result<usize> {
    let mut recorded = 0;
    let mut failures = 0;
    while let Some(item) = discovery.next().await {
        match item {
            Ok(resource) => {
                store
                    .create_or_update_download(
                        archive.id,
                        &NewDownload {
                            filename: resource.filename,
                            url: resource.url,
                            size: resource.approximate_size_bytes,
                        },
                    )
                    .await?;
                recorded += 1;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(archive = %archive.key, error = %format!("{:#}", e), "listing failed");
            }
        }
    }
    if recorded == 0 && failures > 0 {
        anyhow::bail!("could not list archive {}", archive.key);
    }
    store.set_archive_status(archive.id, ArchiveStatus::Pending).await?;
    tracing::info!(archive = %archive.key, recorded, failures, "archive populated");
    Ok(recorded)
}

/// Walk a listing and download every accepted file under `archive_dir`,
/// without touching the catalog. Files already present are skipped.
pub async fn fetch_listing(
    mut discovery: Discovery,
    archive_key: &str,
    archive_dir: &Path,
    engine: Arc<Engine>,
    pool: PoolSettings,
    cancel: &CancelToken,
) -> Result<PoolReport> {
    let workers = DownloadPool::start(engine, pool.workers, pool.queue_capacity, cancel.clone());
    while let Some(item) = discovery.next().await {
        if cancel.is_cancelled() {
            break;
        }
        match item {
            Ok(resource) => {
                let destination = archive_dir.join(relative_path(&resource.filename, archive_key));
                workers
                    .submit(ResourceDescriptor::new(resource.url, destination))
                    .await?;
            }
            Err(e) => tracing::warn!(error = %format!("{:#}", e), "listing failed"),
        }
    }
    workers.finish().await
}

/// Download every download of `archive` not yet `downloaded`, then reconcile.
///
/// Each row is marked `downloading` before it is queued. A finished job, or one
/// whose final file was already on disk, records the size of that file and
/// `downloaded`; a failed job goes back to `pending`. Reconciliation then runs
/// against the recorded sizes.
pub async fn download_archive(
    store: &dyn DownloadStore,
    archive: &ArchiveRecord,
    archive_dir: &Path,
    engine: Arc<Engine>,
    pool: PoolSettings,
    cancel: &CancelToken,
) -> Result<(PoolReport, RescanReport)> {
    let downloads = store.list_downloads(archive.id).await?;
    let mut by_path: HashMap<PathBuf, i64> = HashMap::new();
    let workers = DownloadPool::start(engine, pool.workers, pool.queue_capacity, cancel.clone());

    for download in downloads
        .iter()
        .filter(|d| d.status != DownloadStatus::Downloaded)
    {
        if cancel.is_cancelled() {
            break;
        }
        let destination = download.local_path(archive_dir, &archive.key);
        store
            .update_status(download.id, DownloadStatus::Downloading)
            .await?;
        by_path.insert(destination.clone(), download.id);
        workers
            .submit(ResourceDescriptor::new(download.url.clone(), destination))
            .await?;
    }

    let report = workers.finish().await?;
    for job in &report.jobs {
        let Some(&id) = by_path.get(&job.descriptor.destination) else {
            continue;
        };
        match &job.result {
            Ok(outcome) => {
                // The post-processor may change the size; record what is on disk.
                store.update_size(id, outcome.final_size()).await?;
                store.update_status(id, DownloadStatus::Downloaded).await?;
            }
            Err(_) => store.update_status(id, DownloadStatus::Pending).await?,
        }
        by_path.remove(&job.descriptor.destination);
    }
    // Queued rows that never ran (cancelled before submit completed).
    for id in by_path.into_values() {
        store.update_status(id, DownloadStatus::Pending).await?;
    }

    let rescan = reconcile::rescan_archive(store, archive, archive_dir, None).await?;
    Ok((report, rescan))
}
