//! Session file serving.
//!
//! Videos support single byte ranges so players can seek; result tables and
//! the transcript are small and served whole.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use futures_util::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::range::parse_range;
use crate::state::AppState;

/// Bytes read per body chunk.
const CHUNK_SIZE: u64 = 64 * 1024;

/// A single path segment with no way out of its directory.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains("..")
        && !segment.contains('/')
        && !segment.contains('\\')
}

fn content_type(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".csv") {
        "text/csv; charset=utf-8"
    } else if lower.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

/// `GET /data/:session_id/:file_name`
pub async fn get_session_file(
    State(state): State<AppState>,
    Path((session_id, file_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if !is_safe_segment(&session_id) || !is_safe_segment(&file_name) {
        return Err(ApiError::bad_request("Invalid file path"));
    }

    let path: PathBuf = state.config.data_dir.join(&session_id).join(&file_name);
    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return Err(ApiError::not_found(format!("{}/{}", session_id, file_name))),
    };

    if !file_name.to_lowercase().ends_with(".mp4") {
        let bytes = tokio::fs::read(&path).await?;
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(&file_name))
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))
            .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)));
    }

    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type(&file_name))
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match range_header {
        Some(value) => {
            let range =
                parse_range(&value, size).map_err(|_| ApiError::RangeNotSatisfiable { size })?;
            debug!(file = %path.display(), range = %value, "Serving byte range");
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, range.content_range(size))
                .header(header::CONTENT_LENGTH, range.byte_count())
                .body(Body::from_stream(
                    open_range(&path, range.start, range.byte_count()).await?,
                ))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from_stream(open_range(&path, 0, size).await?)),
    };

    response.map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Stream `len` bytes of `path` starting at `start`.
async fn open_range(
    path: &FsPath,
    start: u64,
    len: u64,
) -> std::io::Result<impl Stream<Item = std::io::Result<Vec<u8>>>> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    Ok(stream::try_unfold(
        (file, len),
        |(mut file, remaining)| async move {
            if remaining == 0 {
                return Ok(None);
            }
            let mut buf = vec![0u8; remaining.min(CHUNK_SIZE) as usize];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok(Some((buf, (file, remaining - n as u64))))
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_segments() {
        assert!(is_safe_segment("12"));
        assert!(is_safe_segment("audio.csv"));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a..b"));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment("a\\b"));
        assert!(!is_safe_segment(""));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type("video.mp4"), "video/mp4");
        assert_eq!(content_type("faces.csv"), "text/csv; charset=utf-8");
        assert_eq!(content_type("transcript.json"), "application/json");
    }
}
