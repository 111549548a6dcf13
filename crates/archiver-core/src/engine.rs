//! Drives one download job through resolve, chunk and finalize.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ArchiverConfig;
use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::fetch_head;
use crate::fetcher::ChunkFetcher;
use crate::finalize::{self, PostProcessor};
use crate::http::RequestHeaders;
use crate::job::{new_context_id, JobContext, JobPhase, PhaseTracker, ResourceDescriptor};
use crate::planner::{self, DEFAULT_CHUNK_SIZE};
use crate::progress::{NoProgress, ProgressSink};
use crate::retry::RetryPolicy;
use crate::scheduler;
use crate::storage::StagingFileBuilder;

/// Per-job tuning shared by every job an engine runs.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub chunk_size: u64,
    pub chunk_concurrency: usize,
    pub retry: RetryPolicy,
    pub headers: RequestHeaders,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_concurrency: 4,
            retry: RetryPolicy::default(),
            headers: RequestHeaders::default(),
        }
    }
}

impl From<&ArchiverConfig> for EngineOptions {
    fn from(cfg: &ArchiverConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            chunk_concurrency: cfg.chunk_concurrency,
            retry: RetryPolicy::from(&cfg.retry_config()),
            headers: RequestHeaders::new(cfg.user_agent.clone()),
        }
    }
}

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// All bytes fetched and finalized at `final_path`.
    ///
    /// `bytes` is the fetched content length; `final_size` is the size of the
    /// finalized file, which differs when the post-processor remuxes.
    Downloaded {
        context_id: String,
        final_path: PathBuf,
        bytes: u64,
        final_size: u64,
    },
    /// The final file already existed; nothing was fetched.
    AlreadyPresent { final_path: PathBuf, final_size: u64 },
}

impl JobOutcome {
    pub fn final_path(&self) -> &Path {
        match self {
            JobOutcome::Downloaded { final_path, .. } | JobOutcome::AlreadyPresent { final_path, .. } => {
                final_path
            }
        }
    }

    /// Size of the file on disk at [`JobOutcome::final_path`].
    pub fn final_size(&self) -> u64 {
        match self {
            JobOutcome::Downloaded { final_size, .. } | JobOutcome::AlreadyPresent { final_size, .. } => {
                *final_size
            }
        }
    }
}

/// Download engine. One instance serves any number of sequential or concurrent jobs.
pub struct Engine {
    options: EngineOptions,
    post: Arc<dyn PostProcessor>,
    progress: Arc<dyn ProgressSink>,
}

impl Engine {
    pub fn new(
        options: EngineOptions,
        post: Arc<dyn PostProcessor>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            options,
            post,
            progress,
        }
    }

    /// Engine with the configured post-processor and no progress reporting.
    pub fn from_config(cfg: &ArchiverConfig) -> Self {
        Self::new(
            EngineOptions::from(cfg),
            Arc::from(finalize::from_config(cfg)),
            Arc::new(NoProgress),
        )
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run one job to completion. Fatal errors are logged with the job's context id
    /// and returned; a partially written staging file stays on disk.
    pub async fn run(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancelToken,
    ) -> Result<JobOutcome, DownloadError> {
        let context_id = new_context_id();
        let mut phases = PhaseTracker::new(context_id.as_str());
        tracing::info!(
            context_id = %context_id,
            url = %descriptor.url,
            destination = %descriptor.destination.display(),
            "download started"
        );

        let result = self.drive(&context_id, &mut phases, descriptor, cancel).await;
        match &result {
            Ok(JobOutcome::Downloaded { bytes, final_size, .. }) => {
                tracing::info!(context_id = %context_id, bytes, final_size, "download complete");
            }
            Ok(JobOutcome::AlreadyPresent { final_path, .. }) => {
                tracing::info!(context_id = %context_id, path = %final_path.display(), "already present, skipped");
            }
            Err(err) => {
                phases.advance(JobPhase::Failed);
                tracing::error!(
                    context_id = %context_id,
                    url = %descriptor.url,
                    kind = err.kind(),
                    error = %err,
                    "download failed"
                );
            }
        }
        result
    }

    async fn drive(
        &self,
        context_id: &str,
        phases: &mut PhaseTracker,
        descriptor: &ResourceDescriptor,
        cancel: &CancelToken,
    ) -> Result<JobOutcome, DownloadError> {
        let final_path = descriptor.destination.clone();
        // Only a successful finalize ever creates the final path.
        if let Ok(meta) = tokio::fs::metadata(&final_path).await {
            if meta.is_file() {
                phases.advance(JobPhase::Done);
                return Ok(JobOutcome::AlreadyPresent {
                    final_path,
                    final_size: meta.len(),
                });
            }
        }
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        phases.advance(JobPhase::Resolving);
        let endpoint =
            fetch_head::resolve_async(descriptor.url.clone(), self.options.headers.clone()).await?;
        let ctx = JobContext::new(context_id.to_string(), endpoint, &final_path);
        tracing::debug!(
            context_id = %ctx.context_id,
            final_url = %ctx.final_url,
            content_length = ctx.content_length,
            "endpoint resolved"
        );
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        phases.advance(JobPhase::Chunking);
        let chunks = planner::plan_chunks(ctx.content_length, self.options.chunk_size);
        let staging_path = ctx.staging_path.clone();
        let content_length = ctx.content_length;
        let writer = tokio::task::spawn_blocking(move || -> Result<_, DownloadError> {
            let mut builder = StagingFileBuilder::create(&staging_path)?;
            builder.preallocate(content_length)?;
            Ok(builder.build())
        })
        .await
        .map_err(|e| DownloadError::Worker(format!("staging setup task: {}", e)))??;

        let fetcher = ChunkFetcher::new(
            ctx.context_id.as_str(),
            ctx.final_url.as_str(),
            self.options.headers.clone(),
            self.options.retry,
            cancel.clone(),
        );
        let written = scheduler::download_chunks(
            &ctx,
            &fetcher,
            &writer,
            chunks,
            self.options.chunk_concurrency,
            Arc::clone(&self.progress),
            cancel,
        )
        .await?;
        if written != ctx.content_length {
            return Err(DownloadError::Incomplete {
                written,
                expected: ctx.content_length,
            });
        }

        phases.advance(JobPhase::Finalizing);
        finalize::finalize(&ctx, writer, self.post.as_ref()).await?;
        let final_size = tokio::fs::metadata(&ctx.final_path)
            .await
            .map_err(DownloadError::fs("stat final file", &ctx.final_path))?
            .len();

        phases.advance(JobPhase::Done);
        Ok(JobOutcome::Downloaded {
            context_id: ctx.context_id,
            final_path: ctx.final_path,
            bytes: written,
            final_size,
        })
    }
}
