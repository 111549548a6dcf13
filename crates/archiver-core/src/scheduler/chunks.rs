//! Intra-job scheduling: fan chunks out to fetchers behind an admission gate.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::fetcher::ChunkFetcher;
use crate::job::JobContext;
use crate::planner::ChunkTask;
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::storage::StagingWriter;

/// First chunk error of a job. Later errors are dropped.
#[derive(Default, Clone)]
struct FirstError(Arc<Mutex<Option<DownloadError>>>);

impl FirstError {
    fn record(&self, err: DownloadError) {
        let mut slot = self.0.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn is_set(&self) -> bool {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    fn take(&self) -> Option<DownloadError> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

/// Fetch `chunk` and write it at its offset, then report progress.
async fn run_chunk(
    chunk: ChunkTask,
    context_id: Arc<str>,
    content_length: u64,
    started: Instant,
    fetcher: ChunkFetcher,
    writer: StagingWriter,
    progress: Arc<dyn ProgressSink>,
) -> Result<(), DownloadError> {
    let bytes = fetcher.fetch(chunk).await?;
    let total = tokio::task::spawn_blocking(move || writer.write_chunk(chunk.start, &bytes))
        .await
        .map_err(|e| DownloadError::Worker(format!("chunk write task: {}", e)))??;
    tracing::trace!(context_id = %context_id, start = chunk.start, end = chunk.end, total, "chunk written");
    progress.report(ProgressUpdate {
        context_id: context_id.to_string(),
        bytes_written: total,
        content_length,
        elapsed_secs: started.elapsed().as_secs_f64(),
    });
    Ok(())
}

/// Download every chunk into `writer`, with at most `max_in_flight` fetches
/// running at once. Returns the total bytes written.
///
/// A permit is taken before each task is spawned, so no more than
/// `max_in_flight` tasks ever exist. After the first failure (or cancellation)
/// no further chunk is admitted; tasks already admitted run to completion and
/// are all joined before this returns. The first error wins.
pub async fn download_chunks(
    ctx: &JobContext,
    fetcher: &ChunkFetcher,
    writer: &StagingWriter,
    chunks: Vec<ChunkTask>,
    max_in_flight: usize,
    progress: Arc<dyn ProgressSink>,
    cancel: &CancelToken,
) -> Result<u64, DownloadError> {
    let gate = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let first_error = FirstError::default();
    let context_id: Arc<str> = Arc::from(ctx.context_id.as_str());
    let started = Instant::now();
    let mut tasks = JoinSet::new();

    tracing::debug!(
        context_id = %ctx.context_id,
        chunks = chunks.len(),
        max_in_flight,
        "scheduling chunks"
    );

    for chunk in chunks {
        if cancel.is_cancelled() || first_error.is_set() {
            break;
        }
        let permit = match Arc::clone(&gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        // A task may have failed while we waited for the permit.
        if cancel.is_cancelled() || first_error.is_set() {
            break;
        }

        let errors = first_error.clone();
        let task = run_chunk(
            chunk,
            Arc::clone(&context_id),
            ctx.content_length,
            started,
            fetcher.clone(),
            writer.clone(),
            Arc::clone(&progress),
        );
        tasks.spawn(async move {
            let _permit = permit;
            if let Err(err) = task.await {
                errors.record(err);
            }
        });
    }

    while let Some(done) = tasks.join_next().await {
        if let Err(join_err) = done {
            first_error.record(DownloadError::Worker(join_err.to_string()));
        }
    }

    if let Some(err) = first_error.take() {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }
    Ok(writer.bytes_written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::fetch_head::Endpoint;
    use crate::http::RequestHeaders;
    use crate::retry::RetryPolicy;
    use crate::storage::StagingFileBuilder;

    fn context(dir: &Path, len: u64) -> JobContext {
        JobContext::new(
            "test".to_string(),
            Endpoint {
                final_url: "http://127.0.0.1:1/none".to_string(),
                content_length: len,
            },
            &dir.join("out.bin"),
        )
    }

    #[tokio::test]
    async fn empty_plan_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), 0);
        let writer = StagingFileBuilder::create(&ctx.staging_path).unwrap().build();
        let cancel = CancelToken::new();
        let fetcher = ChunkFetcher::new(
            "test",
            ctx.final_url.clone(),
            RequestHeaders::default(),
            RetryPolicy::default(),
            cancel.clone(),
        );
        let total = download_chunks(
            &ctx,
            &fetcher,
            &writer,
            Vec::new(),
            4,
            Arc::new(crate::progress::NoProgress),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_admits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), 10);
        let writer = StagingFileBuilder::create(&ctx.staging_path).unwrap().build();
        let cancel = CancelToken::new();
        cancel.cancel();
        let fetcher = ChunkFetcher::new(
            "test",
            ctx.final_url.clone(),
            RequestHeaders::default(),
            RetryPolicy::default(),
            cancel.clone(),
        );
        let err = download_chunks(
            &ctx,
            &fetcher,
            &writer,
            crate::planner::plan_chunks(10, 4),
            2,
            Arc::new(crate::progress::NoProgress),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::Cancelled));
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn first_error_keeps_the_first() {
        let slot = FirstError::default();
        assert!(!slot.is_set());
        slot.record(DownloadError::Worker("one".to_string()));
        slot.record(DownloadError::Worker("two".to_string()));
        match slot.take() {
            Some(DownloadError::Worker(msg)) => assert_eq!(msg, "one"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
