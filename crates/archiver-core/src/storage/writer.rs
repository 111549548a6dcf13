//! Concurrent offset writer for staging files.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DownloadError;

/// Writer for a staging file. Safe to clone and use from multiple tasks:
/// chunk ranges are disjoint, so positioned writes need no lock. Only the
/// byte counter is shared mutable state.
#[derive(Debug, Clone)]
pub struct StagingWriter {
    file: Arc<File>,
    staging_path: PathBuf,
    bytes_written: Arc<AtomicU64>,
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0usize;
    while done < data.len() {
        let n = file.seek_write(&data[done..], offset + done as u64)?;
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero));
        }
        done += n;
    }
    Ok(())
}

impl StagingWriter {
    pub(crate) fn from_file_and_path(file: File, staging_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            staging_path,
            bytes_written: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Write `data` at absolute offset `start`, then add its length to the
    /// shared counter. Returns the new cumulative byte count.
    pub fn write_chunk(&self, start: u64, data: &[u8]) -> Result<u64, DownloadError> {
        write_all_at(&self.file, data, start)
            .map_err(DownloadError::fs("write chunk to", &self.staging_path))?;
        let len = data.len() as u64;
        Ok(self.bytes_written.fetch_add(len, Ordering::AcqRel) + len)
    }

    /// Cumulative bytes written by all clones.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    /// Sync file data to disk.
    pub fn sync(&self) -> Result<(), DownloadError> {
        self.file
            .sync_all()
            .map_err(DownloadError::fs("sync", &self.staging_path))
    }

    /// Close this handle and return the staging path. The file is closed once
    /// every clone has been dropped.
    pub fn close(self) -> PathBuf {
        self.staging_path
    }
}
