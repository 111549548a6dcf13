//! `archiver archive rescan <id>` – reconcile statuses with the disk.

use anyhow::Result;
use archiver_core::catalog::CatalogDb;
use archiver_core::config::ArchiverConfig;
use archiver_core::http::RequestHeaders;
use archiver_core::reconcile;
use archiver_core::tasks::spawn_supervised;

use super::require_archive;

pub async fn run_archive_rescan(
    db: &CatalogDb,
    cfg: &ArchiverConfig,
    id: i64,
    refresh_sizes: bool,
) -> Result<()> {
    let archive = require_archive(db, id).await?;
    let archive_dir = cfg.archive_dir(&archive.key);
    let headers = refresh_sizes.then(|| RequestHeaders::new(cfg.user_agent.clone()));

    let task_db = db.clone();
    let task = spawn_supervised(format!("rescan {}", archive.key), async move {
        reconcile::rescan_archive(&task_db, &archive, &archive_dir, headers.as_ref()).await
    });
    let report = task.join().await?;

    println!(
        "Checked {}, changed {}, resized {}; archive is {}.",
        report.checked,
        report.changed,
        report.resized,
        report.status.as_str()
    );
    Ok(())
}
