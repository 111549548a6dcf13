//! `archiver archive add <key>` – create an archive and discover its files.

use std::sync::Arc;

use anyhow::Result;
use archiver_core::catalog::CatalogDb;
use archiver_core::config::ArchiverConfig;
use archiver_core::discovery::{Discovery, ExtensionFilter};
use archiver_core::http::RequestHeaders;
use archiver_core::service;
use archiver_core::tasks::spawn_supervised;

use crate::cli::listing::ArchiveOrgListing;

pub async fn run_archive_add(db: &CatalogDb, cfg: &ArchiverConfig, key: &str, priority: i64) -> Result<()> {
    let key = key.trim().trim_matches('/');
    if key.is_empty() || key.contains('/') {
        anyhow::bail!("invalid archive key {:?}", key);
    }
    if db.find_archive_by_key(key).await?.is_some() {
        anyhow::bail!("archive {} already exists", key);
    }

    let id = db.create_archive(key, priority).await?;
    let archive = db
        .get_archive(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("archive {} vanished", id))?;
    println!("Added archive {} ({}), scanning {}", id, key, cfg.archive_url(key));

    let listing = Arc::new(ArchiveOrgListing::new(RequestHeaders::new(cfg.user_agent.clone())));
    let discovery = Discovery::new(listing, cfg.archive_url(key), ExtensionFilter::from_config(cfg));
    let task_db = db.clone();
    let task = spawn_supervised(format!("populate {}", key), async move {
        service::populate_archive(&task_db, &archive, discovery).await
    });
    let recorded = task.join().await?;

    println!("Found {} file(s).", recorded);
    Ok(())
}
