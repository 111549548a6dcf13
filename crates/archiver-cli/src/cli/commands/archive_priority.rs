//! `archiver archive set-priority <id> <priority>` – reorder an archive in `archive list`.

use anyhow::Result;
use archiver_core::catalog::CatalogDb;

pub async fn run_archive_set_priority(db: &CatalogDb, id: i64, priority: i64) -> Result<()> {
    if !db.set_archive_priority(id, priority).await? {
        anyhow::bail!("archive {} not found", id);
    }
    tracing::debug!(archive = id, priority, "archive priority changed");
    println!("Archive {} priority set to {}", id, priority);
    Ok(())
}
