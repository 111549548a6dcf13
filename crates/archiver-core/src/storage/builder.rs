//! Builder for creating and preallocating staging files.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::writer::StagingWriter;
use crate::error::DownloadError;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Builder for a new staging file. Call `preallocate` then `build` to get
/// a `StagingWriter` that supports concurrent chunk writes.
pub struct StagingFileBuilder {
    file: File,
    staging_path: PathBuf,
}

impl StagingFileBuilder {
    /// Create the staging file (and its parent directories). Truncates an
    /// existing file: there is no chunk journal to resume from.
    pub fn create(staging_path: &Path) -> Result<Self, DownloadError> {
        if let Some(parent) = staging_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(DownloadError::fs("create directory", parent))?;
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(staging_path)
            .map_err(DownloadError::fs("create staging file", staging_path))?;
        Ok(StagingFileBuilder {
            file,
            staging_path: staging_path.to_path_buf(),
        })
    }

    /// Preallocate `size` bytes. On Linux tries `posix_fallocate` for real block
    /// allocation; falls back to `set_len` on failure or non-Unix.
    pub fn preallocate(&mut self, size: u64) -> Result<(), DownloadError> {
        #[cfg(target_os = "linux")]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(size)
            .map_err(DownloadError::fs("preallocate", &self.staging_path))
    }

    /// Finish building and return a writer that can be shared for concurrent writes.
    pub fn build(self) -> StagingWriter {
        StagingWriter::from_file_and_path(self.file, self.staging_path)
    }
}
