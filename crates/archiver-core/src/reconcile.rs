//! Status reconciliation: recorded download state vs. what is on disk.
//!
//! Rules, first match wins, per download:
//! 1. final file present with exactly the expected size → `downloaded`
//! 2. recorded `downloading` → unchanged (a live job owns it)
//! 3. staging file present → `downloading`
//! 4. otherwise → `pending`
//!
//! An archive is `downloaded` when every one of its downloads is, else `pending`.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::catalog::{ArchiveRecord, ArchiveStatus, DownloadStatus, DownloadStore};
use crate::fetch_head;
use crate::http::RequestHeaders;
use crate::storage;

/// What the filesystem says about one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskEvidence {
    /// Size of the final file, if it exists.
    pub final_size: Option<u64>,
    /// Whether `.<name>.download` exists next to it.
    pub staging_present: bool,
}

impl DiskEvidence {
    pub fn observe(final_path: &Path) -> Self {
        let final_size = fs::metadata(final_path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len());
        let staging_present = storage::staging_path(final_path).exists();
        Self {
            final_size,
            staging_present,
        }
    }
}

/// Decide a download's status. Pure.
///
/// An unknown expected size never matches, so such a download is never
/// declared downloaded from disk evidence alone.
pub fn reconcile_download(
    recorded: DownloadStatus,
    expected_size: Option<u64>,
    evidence: &DiskEvidence,
) -> DownloadStatus {
    match (evidence.final_size, expected_size) {
        (Some(actual), Some(expected)) if actual == expected => DownloadStatus::Downloaded,
        _ if recorded == DownloadStatus::Downloading => DownloadStatus::Downloading,
        _ if evidence.staging_present => DownloadStatus::Downloading,
        _ => DownloadStatus::Pending,
    }
}

/// Roll download statuses up into the archive status.
pub fn reconcile_archive<I>(statuses: I) -> ArchiveStatus
where
    I: IntoIterator<Item = DownloadStatus>,
{
    if statuses
        .into_iter()
        .all(|s| s == DownloadStatus::Downloaded)
    {
        ArchiveStatus::Downloaded
    } else {
        ArchiveStatus::Pending
    }
}

/// Counts from one [`rescan_archive`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescanReport {
    pub checked: usize,
    pub changed: usize,
    pub resized: usize,
    pub status: ArchiveStatus,
}

/// Re-derive every download status of `archive` from the files under
/// `archive_dir`, then set the archive status.
///
/// With `refresh` set, the expected size of each download not yet `downloaded`
/// is first re-probed through the resolver; a failed probe is logged and the
/// recorded size kept. Downloaded rows already carry the size of the finished
/// file, which a remux makes differ from the remote size.
pub async fn rescan_archive(
    store: &dyn DownloadStore,
    archive: &ArchiveRecord,
    archive_dir: &Path,
    refresh: Option<&RequestHeaders>,
) -> Result<RescanReport> {
    store
        .set_archive_status(archive.id, ArchiveStatus::Scanning)
        .await?;
    tracing::info!(archive = %archive.key, "rescan started");

    let downloads = store.list_downloads(archive.id).await?;
    let mut statuses = Vec::with_capacity(downloads.len());
    let mut changed = 0;
    let mut resized = 0;

    for download in &downloads {
        let mut expected = download.size;
        if let Some(headers) = refresh.filter(|_| download.status != DownloadStatus::Downloaded) {
            match fetch_head::refresh_size(&download.url, headers).await {
                Ok(size) => {
                    if Some(size) != expected {
                        store.update_size(download.id, size).await?;
                        resized += 1;
                    }
                    expected = Some(size);
                }
                Err(err) => {
                    tracing::warn!(
                        archive = %archive.key,
                        url = %download.url,
                        error = %err,
                        "size refresh failed, keeping recorded size"
                    );
                }
            }
        }

        let final_path = download.local_path(archive_dir, &archive.key);
        let evidence = tokio::task::spawn_blocking(move || DiskEvidence::observe(&final_path)).await?;
        let status = reconcile_download(download.status, expected, &evidence);
        if status != download.status {
            tracing::debug!(
                archive = %archive.key,
                filename = %download.filename,
                from = download.status.as_str(),
                to = status.as_str(),
                "download status reconciled"
            );
            store.update_status(download.id, status).await?;
            changed += 1;
        }
        statuses.push(status);
    }

    let status = reconcile_archive(statuses);
    store.set_archive_status(archive.id, status).await?;
    tracing::info!(
        archive = %archive.key,
        checked = downloads.len(),
        changed,
        resized,
        status = status.as_str(),
        "rescan finished"
    );
    Ok(RescanReport {
        checked: downloads.len(),
        changed,
        resized,
        status,
    })
}
