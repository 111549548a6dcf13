//! Chunk planning: fixed-size half-open byte ranges over a resource.

/// Default chunk size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 256 * 1024;

/// A single chunk: byte range [start, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTask {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl ChunkTask {
    /// Length of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// HTTP Range header value (inclusive end): `bytes=start-(end-1)`.
    pub fn range_header_value(&self) -> String {
        if self.start >= self.end {
            "bytes=0-0".to_string()
        } else {
            format!("bytes={}-{}", self.start, self.end - 1)
        }
    }
}

/// Splits `[0, content_length)` into `chunk_size` ranges; the last one may be shorter.
///
/// Returns an empty vec if `content_length` or `chunk_size` is 0.
pub fn plan_chunks(content_length: u64, chunk_size: u64) -> Vec<ChunkTask> {
    if content_length == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let count = content_length.div_ceil(chunk_size);
    let mut out = Vec::with_capacity(count as usize);
    let mut start = 0u64;
    while start < content_length {
        let end = start.saturating_add(chunk_size).min(content_length);
        out.push(ChunkTask { start, end });
        start = end;
    }
    out
}
