use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::http::DEFAULT_USER_AGENT;
use crate::planner::DEFAULT_CHUNK_SIZE;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per chunk (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_secs: 0.25,
            max_delay_secs: 5.0,
        }
    }
}

/// What happens to a fully staged file: remux through ffmpeg, or a plain rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostProcessKind {
    #[default]
    Ffmpeg,
    Rename,
}

/// Global configuration loaded from `~/.config/archiver/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Root directory; each archive downloads into `<download_root>/<key>/`.
    pub download_root: PathBuf,
    /// Bytes per ranged GET.
    pub chunk_size: u64,
    /// Maximum chunk fetches in flight per job.
    pub chunk_concurrency: usize,
    /// Jobs that may wait in the pool queue before `submit` blocks.
    pub queue_capacity: usize,
    /// Pool workers (None = available parallelism minus one).
    pub workers: Option<usize>,
    /// `user-agent` header sent with every request.
    pub user_agent: String,
    /// Base of archive listing URLs; the archive key is appended.
    pub archive_base_url: String,
    /// Only download files with these extensions (None = everything).
    pub allowed_extensions: Option<Vec<String>>,
    /// Never download files with these extensions; wins over the allow-list.
    pub excluded_extensions: Vec<String>,
    pub post_process: PostProcessKind,
    /// Program used for `post_process = "ffmpeg"`.
    pub ffmpeg_program: String,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("download"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_concurrency: 4,
            queue_capacity: 5,
            workers: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            archive_base_url: "https://archive.org/download".to_string(),
            allowed_extensions: None,
            excluded_extensions: Vec::new(),
            post_process: PostProcessKind::Ffmpeg,
            ffmpeg_program: "ffmpeg".to_string(),
            retry: None,
        }
    }
}

impl ArchiverConfig {
    /// Effective retry settings (section or defaults).
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }
        if self.chunk_concurrency == 0 {
            anyhow::bail!("chunk_concurrency must be greater than 0");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }
        if self.workers == Some(0) {
            anyhow::bail!("workers must be greater than 0 when set");
        }
        if let Some(retry) = &self.retry {
            if retry.max_attempts == 0 {
                anyhow::bail!("retry.max_attempts must be greater than 0");
            }
            if retry.base_delay_secs < 0.0 || retry.max_delay_secs < 0.0 {
                anyhow::bail!("retry delays must not be negative");
            }
        }
        if self.archive_base_url.trim().is_empty() {
            anyhow::bail!("archive_base_url must not be empty");
        }
        Ok(())
    }

    /// Listing URL of an archive: `<archive_base_url>/<key>/`.
    pub fn archive_url(&self, key: &str) -> String {
        format!("{}/{}/", self.archive_base_url.trim_end_matches('/'), key)
    }

    /// Local directory of an archive: `<download_root>/<key>`.
    pub fn archive_dir(&self, key: &str) -> PathBuf {
        self.download_root.join(key)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("archiver")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ArchiverConfig> {
    load_or_init_at(&config_path()?)
}

/// [`load_or_init`] against an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<ArchiverConfig> {
    if !path.exists() {
        let default_cfg = ArchiverConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ArchiverConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
