//! CLI command handlers. Each command is in its own file.

mod archive_add;
mod archive_download;
mod archive_list;
mod archive_priority;
mod archive_remove;
mod archive_rescan;
mod archive_show;
mod fetch;
mod get;
mod summary;

pub use archive_add::run_archive_add;
pub use archive_download::run_archive_download;
pub use archive_list::run_archive_list;
pub use archive_priority::run_archive_set_priority;
pub use archive_remove::run_archive_remove;
pub use archive_rescan::run_archive_rescan;
pub use archive_show::run_archive_show;
pub use fetch::{run_fetch, FetchArgs};
pub use get::run_get;

use anyhow::Result;
use archiver_core::catalog::{ArchiveRecord, CatalogDb};

/// Look up an archive or fail with a readable message.
async fn require_archive(db: &CatalogDb, id: i64) -> Result<ArchiveRecord> {
    db.get_archive(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("archive {} not found", id))
}
