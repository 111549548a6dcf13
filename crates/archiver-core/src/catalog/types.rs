//! Types stored in the catalog.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Archive identifier.
pub type ArchiveId = i64;

/// Download identifier.
pub type DownloadId = i64;

/// Archive status stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Discovery is populating its downloads.
    Analyzing,
    Pending,
    /// A rescan is reconciling its downloads.
    Scanning,
    Downloaded,
}

impl ArchiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveStatus::Analyzing => "analyzing",
            ArchiveStatus::Pending => "pending",
            ArchiveStatus::Scanning => "scanning",
            ArchiveStatus::Downloaded => "downloaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analyzing" => Some(ArchiveStatus::Analyzing),
            "pending" => Some(ArchiveStatus::Pending),
            "scanning" => Some(ArchiveStatus::Scanning),
            "downloaded" => Some(ArchiveStatus::Downloaded),
            _ => None,
        }
    }
}

/// Download status stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Downloaded,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DownloadStatus::Pending),
            "downloading" => Some(DownloadStatus::Downloading),
            "downloaded" => Some(DownloadStatus::Downloaded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub id: ArchiveId,
    /// Internet Archive item key, e.g. `some-collection-item`.
    pub key: String,
    pub status: ArchiveStatus,
    pub priority: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub archive_id: ArchiveId,
    /// URL path as listed, e.g. `/download/<key>/Disc%201/track.flac`.
    pub filename: String,
    pub url: String,
    pub status: DownloadStatus,
    /// Expected size in bytes (listing estimate until refreshed by a probe).
    pub size: Option<u64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DownloadRecord {
    /// Path relative to the archive directory; see [`relative_path`].
    pub fn relative_path(&self, archive_key: &str) -> PathBuf {
        relative_path(&self.filename, archive_key)
    }

    /// `<archive_dir>/<relative path>`.
    pub fn local_path(&self, archive_dir: &Path, archive_key: &str) -> PathBuf {
        archive_dir.join(self.relative_path(archive_key))
    }
}

/// Fields written by `create_or_update_download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDownload {
    pub filename: String,
    pub url: String,
    pub size: Option<u64>,
}

/// On-disk path of a listed file under its archive directory: the
/// `/download/<key>/` prefix is dropped and the rest percent-decoded.
/// Empty, `.` and `..` segments are discarded so the result never leaves
/// the archive directory.
pub fn relative_path(filename: &str, archive_key: &str) -> PathBuf {
    let prefix = format!("/download/{}/", archive_key);
    let trimmed = filename
        .strip_prefix(prefix.as_str())
        .unwrap_or(filename)
        .trim_start_matches('/');

    let mut out = PathBuf::new();
    for segment in trimmed.split('/') {
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        let part = Path::new(decoded.as_ref());
        if matches!(part.components().next(), Some(Component::Normal(_)))
            && part.components().count() == 1
        {
            out.push(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for s in [
            ArchiveStatus::Analyzing,
            ArchiveStatus::Pending,
            ArchiveStatus::Scanning,
            ArchiveStatus::Downloaded,
        ] {
            assert_eq!(ArchiveStatus::parse(s.as_str()), Some(s));
        }
        for s in [
            DownloadStatus::Pending,
            DownloadStatus::Downloading,
            DownloadStatus::Downloaded,
        ] {
            assert_eq!(DownloadStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DownloadStatus::parse("bogus"), None);
    }

    #[test]
    fn relative_path_strips_prefix_and_decodes() {
        assert_eq!(
            relative_path("/download/item/Disc%201/01%20Intro.flac", "item"),
            PathBuf::from("Disc 1").join("01 Intro.flac")
        );
        assert_eq!(relative_path("plain.mp4", "item"), PathBuf::from("plain.mp4"));
    }

    #[test]
    fn relative_path_never_escapes() {
        assert_eq!(
            relative_path("/download/item/..%2F..%2Fetc/passwd", "item"),
            PathBuf::from("passwd")
        );
        assert_eq!(relative_path("/download/item/a/../b", "item"), PathBuf::from("a").join("b"));
    }
}
