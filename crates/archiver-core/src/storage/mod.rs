//! Staging file lifecycle.
//!
//! Creates and preallocates the hidden staging file next to the final path
//! (fallocate on Linux when available, else set_len) and accepts concurrent
//! positioned chunk writes. Moving the staged bytes to the final path is the
//! post-processor's job (see `finalize`).

mod builder;
mod writer;

pub use builder::StagingFileBuilder;
pub use writer::StagingWriter;

use std::path::{Path, PathBuf};

/// Prefix added to the final file name for the staging file.
pub const STAGING_PREFIX: &str = ".";
/// Suffix added to the final file name for the staging file.
pub const STAGING_SUFFIX: &str = ".download";

/// Path of the staging file for `final_path`: `<dir>/.<basename>.download`.
pub fn staging_path(final_path: &Path) -> PathBuf {
    match final_path.file_name() {
        Some(name) => {
            let mut staged = std::ffi::OsString::from(STAGING_PREFIX);
            staged.push(name);
            staged.push(STAGING_SUFFIX);
            final_path.with_file_name(staged)
        }
        None => {
            let mut o = final_path.as_os_str().to_owned();
            o.push(STAGING_SUFFIX);
            PathBuf::from(o)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn staging_path_is_hidden_sibling() {
        let p = staging_path(Path::new("download/key/video.ia.mp4"));
        assert_eq!(p, PathBuf::from("download/key/.video.ia.mp4.download"));
        let p2 = staging_path(Path::new("/tmp/archive.zip"));
        assert_eq!(p2, PathBuf::from("/tmp/.archive.zip.download"));
        let p3 = staging_path(Path::new("bare"));
        assert_eq!(p3, PathBuf::from(".bare.download"));
    }

    #[test]
    fn create_preallocate_write_close() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("nested").join("output.bin");
        let sp = staging_path(&final_path);

        let mut builder = StagingFileBuilder::create(&sp).unwrap();
        builder.preallocate(100).unwrap();
        let writer = builder.build();

        assert_eq!(writer.write_chunk(0, b"hello").unwrap(), 5);
        assert_eq!(writer.write_chunk(50, b"world").unwrap(), 10);
        assert_eq!(writer.write_chunk(95, b"xy").unwrap(), 12);
        assert_eq!(writer.bytes_written(), 12);
        writer.sync().unwrap();
        assert_eq!(writer.close(), sp);

        let mut f = std::fs::File::open(&sp).unwrap();
        let mut buf = vec![0u8; 100];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[0..5], b"hello");
        assert_eq!(&buf[50..55], b"world");
        assert_eq!(&buf[95..97], b"xy");
    }

    #[test]
    fn clones_share_counter_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let sp = dir.path().join(".out.bin.download");
        let mut builder = StagingFileBuilder::create(&sp).unwrap();
        builder.preallocate(12).unwrap();
        let writer = builder.build();

        let handles: Vec<_> = (0..3u8)
            .map(|i| {
                let w = writer.clone();
                std::thread::spawn(move || w.write_chunk(i as u64 * 4, &[b'a' + i; 4]).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(writer.bytes_written(), 12);
        let path = writer.close();
        assert_eq!(std::fs::read(path).unwrap(), b"aaaabbbbcccc");
    }
}
