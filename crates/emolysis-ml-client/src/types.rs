//! Inference service request/response types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use emolysis_media::{Frame, LabelScore};
use emolysis_models::Language;

/// RGB24 image, base64-encoded row-major pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    pub rgb: String,
}

impl ImagePayload {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            rgb: STANDARD.encode(frame.as_raw()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Path of the video as seen by the service (shared volume)
    pub video_path: String,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEmotionRequest {
    pub sample_rate: u32,
    /// Mono little-endian i16 PCM, base64-encoded
    pub pcm: String,
}

impl AudioEmotionRequest {
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            sample_rate,
            pcm: STANDARD.encode(bytes),
        }
    }
}

/// BoLD scores plus valence/arousal on the BoLD scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEmotionResponse {
    pub scores: Vec<f64>,
    pub valence: f64,
    pub arousal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEmotionRequest {
    pub text: String,
    pub language: Language,
}

/// Text head output.
///
/// Chinese responses carry `scores` (BoLD); English responses carry
/// `labels` from the named classifier with valence/arousal in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEmotionResponse {
    pub valence: f64,
    pub arousal: f64,
    #[serde(default)]
    pub scores: Option<Vec<f64>>,
    #[serde(default)]
    pub labels: Option<Vec<LabelScore>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub image: ImagePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: [f64; 4],
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetectResponse {
    pub faces: Vec<DetectedFace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceEmotionResponse {
    pub scores: Vec<f64>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
