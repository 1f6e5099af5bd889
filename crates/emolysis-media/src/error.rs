//! Error types for media and reduction operations.

use std::path::PathBuf;
use thiserror::Error;

use emolysis_models::{UnsupportedLanguageError, WindowError};

use crate::label_space::Taxonomy;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// A rescale was requested from a zero-width source range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("degenerate source range [{min}, {max}]")]
pub struct DegenerateRangeError {
    pub min: f64,
    pub max: f64,
}

/// Errors that can occur during media processing and label mapping.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error(transparent)]
    DegenerateRange(#[from] DegenerateRangeError),

    #[error("{taxonomy} scores need {expected} entries, got {actual}")]
    LabelDimension {
        taxonomy: Taxonomy,
        expected: usize,
        actual: usize,
    },

    #[error("{0} has no valence/arousal scale")]
    NoAffectScale(Taxonomy),

    #[error("Unknown emotion label: {0}")]
    UnknownLabel(String),

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguageError),

    #[error("Invalid window: {0}")]
    Window(#[from] WindowError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an inference failure error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
