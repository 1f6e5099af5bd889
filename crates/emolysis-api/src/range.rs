//! `Range: bytes=a-b` parsing.
//!
//! Only a single range is supported. An empty start means 0 and an empty end
//! means the last byte; there are no suffix ranges.

use thiserror::Error;

/// Inclusive byte range inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Range header that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid range {header:?} for {size} bytes")]
pub struct InvalidRange {
    pub header: String,
    pub size: u64,
}

/// Parse a `Range` header value against a file of `size` bytes.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, InvalidRange> {
    let invalid = || InvalidRange {
        header: header.to_string(),
        size,
    };

    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(invalid)?
        .trim();
    if spec.contains(',') || size == 0 {
        return Err(invalid());
    }
    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;

    let start = match start.trim() {
        "" => 0,
        s => s.parse::<u64>().map_err(|_| invalid())?,
    };
    let end = match end.trim() {
        "" => size - 1,
        s => s.parse::<u64>().map_err(|_| invalid())?,
    };

    if start > end || end >= size {
        return Err(invalid());
    }
    Ok(ByteRange { start, end })
}
