//! Progress reporting for downloads (bytes written, rate, ETA).
//!
//! The scheduler reports after every chunk write. Reports from concurrent
//! chunks can arrive in any order; only `bytes_written` never decreases for a
//! given job.

use tokio::sync::mpsc;

/// Snapshot of one job's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Correlation token of the job.
    pub context_id: String,
    /// Bytes written to the staging file so far.
    pub bytes_written: u64,
    /// Total resource size in bytes.
    pub content_length: u64,
    /// Elapsed time since chunking started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressUpdate {
    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_written as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if the rate is still 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.content_length.saturating_sub(self.bytes_written);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.content_length == 0 {
            return 1.0;
        }
        (self.bytes_written as f64 / self.content_length as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_written >= self.content_length
    }
}

/// Receives progress updates. Must not block: it is called from chunk tasks.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates into a bounded channel; drops updates when it is full.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    /// Build a sink and its receiver with the given capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        // Completion updates are worth waiting for a slot; intermediate ones are not.
        if let Err(mpsc::error::TrySendError::Full(update)) = self.tx.try_send(update) {
            if update.is_complete() {
                let tx = self.tx.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = tx.send(update).await;
                    });
                }
            }
        }
    }
}
