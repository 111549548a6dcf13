//! `archiver archive remove <id>` – remove an archive; optionally delete its files with --delete-files.

use anyhow::{Context, Result};
use archiver_core::catalog::CatalogDb;
use archiver_core::config::ArchiverConfig;

use super::require_archive;

pub async fn run_archive_remove(
    db: &CatalogDb,
    cfg: &ArchiverConfig,
    id: i64,
    delete_files: bool,
) -> Result<()> {
    let archive = require_archive(db, id).await?;
    db.delete_archive(id).await?;

    if delete_files {
        let dir = cfg.archive_dir(&archive.key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(path = %dir.display(), "deleted archive directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("delete {}", dir.display())),
        }
    }

    println!("Removed archive {} ({})", id, archive.key);
    Ok(())
}
