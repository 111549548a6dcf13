//! `archiver archive show <id>` – one archive and its downloads, optionally
//! only those in one status.

use anyhow::Result;
use archiver_core::catalog::{CatalogDb, DownloadStatus, DownloadStore};

use super::require_archive;

pub async fn run_archive_show(db: &CatalogDb, id: i64, status: Option<DownloadStatus>) -> Result<()> {
    let archive = require_archive(db, id).await?;
    let downloads = match status {
        Some(status) => db.list_downloads_with_status(id, status).await?,
        None => db.list_downloads(id).await?,
    };
    let filter = status
        .map(|s| format!(" {}", s.as_str()))
        .unwrap_or_default();
    println!(
        "Archive {} ({}) status {}, {}{} file(s)",
        archive.id,
        archive.key,
        archive.status.as_str(),
        downloads.len(),
        filter
    );
    if downloads.is_empty() {
        return Ok(());
    }
    println!("{:<6} {:<12} {:>10} {}", "ID", "STATUS", "SIZE MiB", "PATH");
    for d in downloads {
        let size = d
            .size
            .map(|s| format!("{:.2}", s as f64 / 1_048_576.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<12} {:>10} {}",
            d.id,
            d.status.as_str(),
            size,
            d.relative_path(&archive.key).display()
        );
    }
    Ok(())
}
