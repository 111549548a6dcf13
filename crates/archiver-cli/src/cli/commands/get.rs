//! `archiver get <url> <path>` – download one file.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use archiver_core::config::ArchiverConfig;
use archiver_core::control::CancelToken;
use archiver_core::engine::{Engine, JobOutcome};
use archiver_core::job::ResourceDescriptor;
use archiver_core::progress::ChannelProgress;

use crate::cli::progress;

pub async fn run_get(cfg: &ArchiverConfig, url: &str, path: &Path, cancel: &CancelToken) -> Result<()> {
    let (sink, rx) = ChannelProgress::channel(64);
    let printer = progress::spawn_printer(rx);
    let engine = Engine::from_config(cfg).with_progress(Arc::new(sink));

    let result = engine.run(&ResourceDescriptor::new(url, path), cancel).await;
    drop(engine);
    progress::finish_printer(printer).await;

    match result? {
        JobOutcome::Downloaded {
            final_path, bytes, ..
        } => println!("Saved {} ({} bytes)", final_path.display(), bytes),
        JobOutcome::AlreadyPresent { final_path, .. } => {
            println!("Already present: {}", final_path.display())
        }
    }
    Ok(())
}
