//! `archiver archive list` – list archives.

use anyhow::Result;
use archiver_core::catalog::CatalogDb;

pub async fn run_archive_list(db: &CatalogDb) -> Result<()> {
    let archives = db.list_archives().await?;
    if archives.is_empty() {
        println!("No archives in catalog.");
        return Ok(());
    }
    println!("{:<6} {:<11} {:<8} {}", "ID", "STATUS", "PRIORITY", "KEY");
    for a in archives {
        println!(
            "{:<6} {:<11} {:<8} {}",
            a.id,
            a.status.as_str(),
            a.priority,
            a.key
        );
    }
    Ok(())
}
