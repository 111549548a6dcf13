//! CLI for the archiver.

mod commands;
mod listing;
mod progress;

use anyhow::Result;
use archiver_core::catalog::{CatalogDb, DownloadStatus};
use archiver_core::config::{self, ArchiverConfig};
use archiver_core::control::CancelToken;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    run_archive_add, run_archive_download, run_archive_list, run_archive_remove,
    run_archive_rescan, run_archive_set_priority, run_archive_show, run_fetch, run_get, FetchArgs,
};

/// Top-level CLI for the archiver.
#[derive(Debug, Parser)]
#[command(name = "archiver")]
#[command(about = "Internet Archive item downloader with parallel range requests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every file of an archive item (no catalog).
    Fetch {
        /// Item key, as in https://archive.org/download/<key>/.
        key: String,
        /// Only files ending with one of these (comma-separated).
        #[arg(long, short = 'M', value_name = "EXTS")]
        ext_match: Option<String>,
        /// Never files ending with one of these (comma-separated).
        #[arg(long, short = 'E', value_name = "EXTS")]
        ext_exclusion: Option<String>,
        /// Destination directory (default: <download_root>/<key>).
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },

    /// Download a single URL to a path.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Final file path.
        path: PathBuf,
    },

    /// Manage archives in the catalog.
    Archive {
        #[command(subcommand)]
        command: ArchiveCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ArchiveCommand {
    /// Add an archive and discover its files.
    Add {
        key: String,
        /// Higher priorities are listed first.
        #[arg(long, default_value = "0")]
        priority: i64,
    },

    /// List archives.
    List,

    /// Show an archive and its downloads.
    Show {
        /// Archive identifier.
        id: i64,
        /// Only downloads in this status (pending, downloading, downloaded).
        #[arg(long, value_parser = parse_download_status)]
        status: Option<DownloadStatus>,
    },

    /// Change an archive's priority.
    SetPriority {
        /// Archive identifier.
        id: i64,
        /// Higher priorities are listed first.
        #[arg(allow_negative_numbers = true)]
        priority: i64,
    },

    /// Remove an archive and its downloads from the catalog.
    Remove {
        /// Archive identifier.
        id: i64,
        /// Also delete <download_root>/<key> from disk.
        #[arg(long)]
        delete_files: bool,
    },

    /// Reconcile download statuses with the files on disk.
    Rescan {
        /// Archive identifier.
        id: i64,
        /// Re-probe each file's size before comparing.
        #[arg(long)]
        refresh_sizes: bool,
    },

    /// Download every file of an archive that is not downloaded yet.
    Download {
        /// Archive identifier.
        id: i64,
    },
}

fn parse_download_status(s: &str) -> Result<DownloadStatus, String> {
    DownloadStatus::parse(&s.to_ascii_lowercase())
        .ok_or_else(|| format!("expected pending, downloading or downloaded, got {:?}", s))
}

/// Cancel token tripped by Ctrl-C. In-flight chunks finish; nothing new starts.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted: finishing in-flight chunks, staging files are kept");
            tracing::warn!("interrupted by user");
            token.cancel();
        }
    });
    cancel
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        cli.command.run(&cfg).await
    }

    async fn run(self, cfg: &ArchiverConfig) -> Result<()> {
        match self {
            CliCommand::Fetch {
                key,
                ext_match,
                ext_exclusion,
                dest,
            } => {
                let args = FetchArgs {
                    key,
                    ext_match,
                    ext_exclusion,
                    dest,
                };
                run_fetch(cfg, args, &cancel_on_ctrl_c()).await?
            }
            CliCommand::Get { url, path } => run_get(cfg, &url, &path, &cancel_on_ctrl_c()).await?,
            CliCommand::Archive { command } => {
                let db = CatalogDb::open_default().await?;
                match command {
                    ArchiveCommand::Add { key, priority } => {
                        run_archive_add(&db, cfg, &key, priority).await?
                    }
                    ArchiveCommand::List => run_archive_list(&db).await?,
                    ArchiveCommand::Show { id, status } => run_archive_show(&db, id, status).await?,
                    ArchiveCommand::SetPriority { id, priority } => {
                        run_archive_set_priority(&db, id, priority).await?
                    }
                    ArchiveCommand::Remove { id, delete_files } => {
                        run_archive_remove(&db, cfg, id, delete_files).await?
                    }
                    ArchiveCommand::Rescan { id, refresh_sizes } => {
                        run_archive_rescan(&db, cfg, id, refresh_sizes).await?
                    }
                    ArchiveCommand::Download { id } => {
                        run_archive_download(&db, cfg, id, &cancel_on_ctrl_c()).await?
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
