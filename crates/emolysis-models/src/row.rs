//! Result table rows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::emotion::{AffectPair, EmotionVector};
use crate::window::TimeWindow;

/// A time-span row of the audio or text table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentRow {
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
    pub valence: f64,
    pub arousal: f64,
    pub emotion: EmotionVector,
}

impl SegmentRow {
    pub fn new(start: f64, end: f64, affect: AffectPair, emotion: EmotionVector) -> Self {
        Self {
            start,
            end,
            valence: affect.valence,
            arousal: affect.arousal,
            emotion,
        }
    }

    pub fn from_window(window: TimeWindow, affect: AffectPair, emotion: EmotionVector) -> Self {
        Self::new(window.start_secs(), window.end_secs(), affect, emotion)
    }
}

/// A detected face in a single frame.
///
/// Box corners are the detector's coordinates truncated to integers; they may
/// lie outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceRow {
    pub frame: u64,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub box_prob: f64,
    pub emotion: EmotionVector,
    pub valence: i64,
    pub arousal: i64,
}
