//! Finalizing a fully staged download: sync, post-process, clean up.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use crate::config::{ArchiverConfig, PostProcessKind};
use crate::error::DownloadError;
use crate::job::JobContext;
use crate::storage::StagingWriter;

/// Keep this much of a failing post-processor's stderr in the error.
const STDERR_TAIL: usize = 1024;

/// Turns a complete staging file into the final file.
///
/// Implementations may consume the staging file (rename) or leave it in place
/// (remux into a new file); [`finalize`] removes whatever is left afterwards.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, staging: &Path, final_path: &Path) -> Result<(), DownloadError>;
}

/// Plain rename of the staging file onto the final path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOnly;

#[async_trait]
impl PostProcessor for RenameOnly {
    fn name(&self) -> &'static str {
        "rename"
    }

    async fn process(&self, staging: &Path, final_path: &Path) -> Result<(), DownloadError> {
        tokio::fs::rename(staging, final_path)
            .await
            .map_err(DownloadError::fs("rename staging file onto", final_path))
    }
}

/// Container remux without re-encoding: `<program> -y -i <staging> -c copy <final>`.
#[derive(Debug, Clone)]
pub struct FfmpegRemux {
    program: String,
}

impl FfmpegRemux {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegRemux {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl PostProcessor for FfmpegRemux {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn process(&self, staging: &Path, final_path: &Path) -> Result<(), DownloadError> {
        let failed = |reason: String| DownloadError::PostProcess {
            staging: staging.to_path_buf(),
            reason,
        };

        let output = tokio::process::Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(staging)
            .args(["-c", "copy"])
            .arg(final_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| failed(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(tail_start..).unwrap_or(stderr.as_str()).trim();
            return Err(failed(format!("{} exited with {}: {}", self.program, output.status, tail)));
        }
        Ok(())
    }
}

/// Post-processor selected by configuration.
pub fn from_config(cfg: &ArchiverConfig) -> Box<dyn PostProcessor> {
    match cfg.post_process {
        PostProcessKind::Ffmpeg => Box::new(FfmpegRemux::new(cfg.ffmpeg_program.clone())),
        PostProcessKind::Rename => Box::new(RenameOnly),
    }
}

/// Sync and close the staging file, run `post`, then drop the staging file.
///
/// On post-processing failure any partial output at the final path is removed
/// and the staging file is kept for inspection.
pub async fn finalize(
    ctx: &JobContext,
    writer: StagingWriter,
    post: &dyn PostProcessor,
) -> Result<(), DownloadError> {
    let staging = tokio::task::spawn_blocking(move || -> Result<_, DownloadError> {
        writer.sync()?;
        Ok(writer.close())
    })
    .await
    .map_err(|e| DownloadError::Worker(format!("staging sync task: {}", e)))??;

    tracing::debug!(
        context_id = %ctx.context_id,
        post_processor = post.name(),
        staging = %staging.display(),
        "post-processing"
    );

    if let Err(err) = post.process(&staging, &ctx.final_path).await {
        if staging != ctx.final_path && tokio::fs::try_exists(&ctx.final_path).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&ctx.final_path).await {
                tracing::warn!(
                    context_id = %ctx.context_id,
                    path = %ctx.final_path.display(),
                    error = %e,
                    "could not remove partial output"
                );
            }
        }
        return Err(err);
    }

    match tokio::fs::remove_file(&staging).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::fs("remove staging file", &staging)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch_head::Endpoint;
    use crate::storage::StagingFileBuilder;

    fn staged(dir: &Path, data: &[u8]) -> (JobContext, StagingWriter) {
        let ctx = JobContext::new(
            "test".to_string(),
            Endpoint {
                final_url: "http://x/f.bin".to_string(),
                content_length: data.len() as u64,
            },
            &dir.join("f.bin"),
        );
        let writer = StagingFileBuilder::create(&ctx.staging_path).unwrap().build();
        writer.write_chunk(0, data).unwrap();
        (ctx, writer)
    }

    struct Failing;

    #[async_trait]
    impl PostProcessor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn process(&self, staging: &Path, final_path: &Path) -> Result<(), DownloadError> {
            tokio::fs::write(final_path, b"partial").await.unwrap();
            Err(DownloadError::PostProcess {
                staging: staging.to_path_buf(),
                reason: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn rename_moves_staging_onto_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, writer) = staged(dir.path(), b"hello");
        finalize(&ctx, writer, &RenameOnly).await.unwrap();
        assert_eq!(std::fs::read(&ctx.final_path).unwrap(), b"hello");
        assert!(!ctx.staging_path.exists());
    }

    #[tokio::test]
    async fn failure_keeps_staging_and_drops_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, writer) = staged(dir.path(), b"hello");
        let err = finalize(&ctx, writer, &Failing).await.unwrap_err();
        assert_eq!(err.kind(), "post-process");
        assert!(ctx.staging_path.exists());
        assert!(!ctx.final_path.exists());
    }

    #[tokio::test]
    async fn missing_program_is_post_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, writer) = staged(dir.path(), b"hello");
        let remux = FfmpegRemux::new("archiver-no-such-program");
        let err = finalize(&ctx, writer, &remux).await.unwrap_err();
        assert!(matches!(err, DownloadError::PostProcess { .. }));
        assert!(ctx.staging_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_post_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, writer) = staged(dir.path(), b"hello");
        let err = finalize(&ctx, writer, &FfmpegRemux::new("false"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("false exited"));
    }

    #[test]
    fn from_config_picks_processor() {
        let mut cfg = ArchiverConfig::default();
        assert_eq!(from_config(&cfg).name(), "ffmpeg");
        cfg.post_process = PostProcessKind::Rename;
        assert_eq!(from_config(&cfg).name(), "rename");
    }
}
