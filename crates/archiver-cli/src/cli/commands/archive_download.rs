//! `archiver archive download <id>` – download what is missing, then reconcile.

use std::sync::Arc;

use anyhow::Result;
use archiver_core::catalog::CatalogDb;
use archiver_core::config::ArchiverConfig;
use archiver_core::control::CancelToken;
use archiver_core::engine::Engine;
use archiver_core::progress::ChannelProgress;
use archiver_core::service::{self, PoolSettings};

use super::require_archive;
use super::summary::report_pool;
use crate::cli::progress;

pub async fn run_archive_download(
    db: &CatalogDb,
    cfg: &ArchiverConfig,
    id: i64,
    cancel: &CancelToken,
) -> Result<()> {
    let archive = require_archive(db, id).await?;
    let archive_dir = cfg.archive_dir(&archive.key);

    let (sink, rx) = ChannelProgress::channel(64);
    let printer = progress::spawn_printer(rx);
    let engine = Arc::new(Engine::from_config(cfg).with_progress(Arc::new(sink)));

    let (report, rescan) = service::download_archive(
        db,
        &archive,
        &archive_dir,
        engine,
        PoolSettings::from_config(cfg),
        cancel,
    )
    .await?;
    progress::finish_printer(printer).await;

    println!("Archive {} is {}.", archive.key, rescan.status.as_str());
    report_pool(&report)
}
