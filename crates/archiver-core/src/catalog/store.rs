//! Persistence interface used by reconciliation and the download commands.

use anyhow::Result;
use async_trait::async_trait;

use super::types::{ArchiveId, ArchiveStatus, DownloadId, DownloadRecord, DownloadStatus, NewDownload};

/// Download-row persistence. [`CatalogDb`](super::CatalogDb) is the SQLite
/// implementation; tests may supply their own.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Insert a download, or refresh url and size of the row with the same
    /// `(archive_id, filename)`. Returns the row id.
    async fn create_or_update_download(
        &self,
        archive_id: ArchiveId,
        download: &NewDownload,
    ) -> Result<DownloadId>;

    async fn update_status(&self, id: DownloadId, status: DownloadStatus) -> Result<()>;

    async fn update_size(&self, id: DownloadId, size: u64) -> Result<()>;

    /// Downloads of one archive, ordered by filename.
    async fn list_downloads(&self, archive_id: ArchiveId) -> Result<Vec<DownloadRecord>>;

    /// Remove every download of an archive. Returns how many were removed.
    async fn delete_downloads(&self, archive_id: ArchiveId) -> Result<u64>;

    async fn set_archive_status(&self, archive_id: ArchiveId, status: ArchiveStatus) -> Result<()>;
}
