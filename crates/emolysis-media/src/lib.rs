//! Emotion reduction primitives and media decoding.
//!
//! This crate provides:
//! - Label-space mapping from analyzer taxonomies into the canonical space
//! - Window aggregation and audio segmentation
//! - Frame and transcript reducers over pluggable model traits
//! - FFmpeg/FFprobe decoding of PCM audio and RGB frames
//! - CSV result tables

pub mod aggregator;
pub mod decode;
pub mod error;
pub mod frame;
pub mod label_space;
pub mod probe;
pub mod providers;
pub mod segmenter;
pub mod table;
pub mod transcript;

pub use aggregator::{AggregatedRow, WindowAggregator};
pub use decode::{
    AudioClip, AudioTrack, FfmpegDecoder, Frame, FrameSource, MediaDecoder, DEFAULT_SAMPLE_RATE,
};
pub use error::{DegenerateRangeError, MediaError, MediaResult};
pub use frame::{FrameReducer, DEFAULT_FACE_THRESHOLD};
pub use label_space::{AffectScale, LabelScore, Taxonomy};
pub use probe::{probe_video, VideoInfo};
pub use providers::{
    AudioAnalyzer, AudioScores, EmotionScores, FaceDetection, FaceDetector, FaceEmotionScorer,
    ModelRegistry, TextAnalyzer, TextScores, Transcriber,
};
pub use segmenter::{AnalysisWindow, AudioSegmenter, GridSplit};
pub use transcript::{Transcript, TranscriptReducer, TranscriptSegment};
