//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use emolysis_media::segmenter::{DEFAULT_STRIDE_SECS, DEFAULT_WINDOW_SECS};
use emolysis_media::{DEFAULT_FACE_THRESHOLD, DEFAULT_SAMPLE_RATE};

/// Per-session pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the per-session directories
    pub data_dir: PathBuf,
    /// Distance between audio window starts, seconds
    pub segment_stride: f64,
    /// Audio window length, seconds
    pub segment_duration: f64,
    /// PCM sample rate handed to the audio analyzer
    pub audio_sample_rate: u32,
    /// Minimum (exclusive) face detector confidence
    pub face_threshold: f64,
    /// Audio windows between progress messages
    pub audio_step: u64,
    /// Transcript segments between progress messages
    pub text_step: u64,
    /// Frames between progress messages
    pub visual_step: u64,
    /// How long to wait for a client acknowledgment
    pub ack_timeout: Duration,
    /// Maximum concurrent inference calls across all sessions
    pub max_inference_parallel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            segment_stride: DEFAULT_STRIDE_SECS,
            segment_duration: DEFAULT_WINDOW_SECS,
            audio_sample_rate: DEFAULT_SAMPLE_RATE,
            face_threshold: DEFAULT_FACE_THRESHOLD,
            audio_step: 10,
            text_step: 10,
            visual_step: 100,
            ack_timeout: Duration::from_secs(300),
            max_inference_parallel: 4,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            segment_stride: env_parse("SEGMENT_STRIDE").unwrap_or(defaults.segment_stride),
            segment_duration: env_parse("SEGMENT_DURATION").unwrap_or(defaults.segment_duration),
            audio_sample_rate: env_parse("AUDIO_SAMPLE_RATE").unwrap_or(defaults.audio_sample_rate),
            face_threshold: env_parse("FACE_CONFIDENCE_THRESHOLD")
                .unwrap_or(defaults.face_threshold),
            audio_step: env_parse("PROGRESS_AUDIO_STEP")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.audio_step),
            text_step: env_parse("PROGRESS_TEXT_STEP")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.text_step),
            visual_step: env_parse("PROGRESS_VISUAL_STEP")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.visual_step),
            ack_timeout: env_parse("ACK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ack_timeout),
            max_inference_parallel: env_parse("MAX_INFERENCE_PARALLEL")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_inference_parallel),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
