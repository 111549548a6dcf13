//! Error taxonomy for a download job.
//!
//! Every fatal outcome of the engine is one of these variants. Per-attempt chunk
//! failures are [`FetchError`]s and only surface wrapped in
//! [`DownloadError::ChunkRetryExhausted`].

use std::io;
use std::path::{Path, PathBuf};

use crate::retry::FetchError;

/// Fatal error for a single download job.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HEAD failed, returned a non-success status, or redirects did not settle.
    #[error("could not resolve {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// The server does not advertise `accept-ranges: bytes`.
    #[error("{url} does not advertise accept-ranges: bytes")]
    RangeUnsupported { url: String },

    /// `content-length` missing, unparsable or zero.
    #[error("could not determine content length of {url}")]
    LengthUnknown { url: String },

    /// One byte range failed on every attempt of its retry budget.
    #[error("chunk {start}-{end} failed after {attempts} attempts: {last_error}")]
    ChunkRetryExhausted {
        start: u64,
        end: u64,
        attempts: u32,
        #[source]
        last_error: FetchError,
    },

    /// Staging or final path I/O failed.
    #[error("{action} {}: {source}", path.display())]
    FileSystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external post-processing step failed; staged bytes are kept.
    #[error("post-processing {} failed: {reason}", staging.display())]
    PostProcess { staging: PathBuf, reason: String },

    /// Every chunk reported success but the byte count does not add up.
    #[error("wrote {written} of {expected} bytes")]
    Incomplete { written: u64, expected: u64 },

    /// A chunk worker task panicked or was torn down.
    #[error("chunk worker failed: {0}")]
    Worker(String),

    /// The job observed its cancel token.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Builds a `map_err` adapter that wraps an I/O error with the action and path.
    pub fn fs<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| DownloadError::FileSystem {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn resolution(url: &str, reason: impl Into<String>) -> Self {
        DownloadError::Resolution {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Short stable label used in logs and CLI summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadError::Resolution { .. } => "resolution",
            DownloadError::RangeUnsupported { .. } => "range-unsupported",
            DownloadError::LengthUnknown { .. } => "length-unknown",
            DownloadError::ChunkRetryExhausted { .. } => "chunk-retry-exhausted",
            DownloadError::FileSystem { .. } => "filesystem",
            DownloadError::PostProcess { .. } => "post-process",
            DownloadError::Incomplete { .. } => "incomplete",
            DownloadError::Worker(_) => "worker",
            DownloadError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_adapter_keeps_path_and_action() {
        let err = DownloadError::fs("create staging file", Path::new("/tmp/.a.download"))(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), "filesystem");
        let msg = err.to_string();
        assert!(msg.contains("create staging file"));
        assert!(msg.contains("/tmp/.a.download"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn incomplete_reports_both_counts() {
        let err = DownloadError::Incomplete {
            written: 10,
            expected: 12,
        };
        assert_eq!(err.kind(), "incomplete");
        assert_eq!(err.to_string(), "wrote 10 of 12 bytes");
    }

    #[test]
    fn exhausted_message_names_range() {
        let err = DownloadError::ChunkRetryExhausted {
            start: 0,
            end: 262144,
            attempts: 10,
            last_error: FetchError::Http {
                status: 503,
                body: String::new(),
            },
        };
        assert_eq!(
            err.to_string(),
            "chunk 0-262144 failed after 10 attempts: HTTP 503"
        );
    }
}
