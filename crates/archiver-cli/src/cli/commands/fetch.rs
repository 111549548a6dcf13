//! `archiver fetch <key>` – download a whole item without the catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use archiver_core::config::ArchiverConfig;
use archiver_core::control::CancelToken;
use archiver_core::discovery::{Discovery, ExtensionFilter};
use archiver_core::engine::Engine;
use archiver_core::progress::ChannelProgress;
use archiver_core::service::{self, PoolSettings};

use super::summary::report_pool;
use crate::cli::listing::ArchiveOrgListing;
use crate::cli::progress;

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub key: String,
    pub ext_match: Option<String>,
    pub ext_exclusion: Option<String>,
    pub dest: Option<PathBuf>,
}

/// Command-line filters replace the configured ones.
fn filter_for(cfg: &ArchiverConfig, args: &FetchArgs) -> ExtensionFilter {
    let allowed = match &args.ext_match {
        Some(list) => Some(ExtensionFilter::parse_csv(list)),
        None => cfg.allowed_extensions.clone(),
    };
    let excluded = match &args.ext_exclusion {
        Some(list) => ExtensionFilter::parse_csv(list),
        None => cfg.excluded_extensions.clone(),
    };
    ExtensionFilter::new(allowed, excluded)
}

pub async fn run_fetch(cfg: &ArchiverConfig, args: FetchArgs, cancel: &CancelToken) -> Result<()> {
    let page_url = cfg.archive_url(&args.key);
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| cfg.archive_dir(&args.key));
    let filter = filter_for(cfg, &args);

    let (sink, rx) = ChannelProgress::channel(64);
    let printer = progress::spawn_printer(rx);
    let engine = Arc::new(Engine::from_config(cfg).with_progress(Arc::new(sink)));
    let listing = Arc::new(ArchiveOrgListing::new(engine.options().headers.clone()));

    println!("Scanning: {}", page_url);
    let report = service::fetch_listing(
        Discovery::new(listing, page_url, filter),
        &args.key,
        &dest,
        engine,
        PoolSettings::from_config(cfg),
        cancel,
    )
    .await?;
    progress::finish_printer(printer).await;

    report_pool(&report)
}
