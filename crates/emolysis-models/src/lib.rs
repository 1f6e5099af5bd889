//! Shared data models for the Emolysis backend.
//!
//! This crate provides Serde-serializable types for:
//! - The canonical emotion space (emotion vectors, valence/arousal)
//! - Millisecond time windows
//! - Audio/text/face result rows
//! - Session identity and directory layout
//! - Progress channel message schemas

pub mod emotion;
pub mod language;
pub mod row;
pub mod session;
pub mod window;
pub mod ws;

// Re-export common types
pub use emotion::{
    AffectPair, Emotion, EmotionVector, Normalized, Observation, AFFECT_MAX, AFFECT_MIN,
    EMOTION_CLASSES, NORMALIZATION_TOLERANCE,
};
pub use language::{Language, UnsupportedLanguageError};
pub use row::{FaceRow, SegmentRow};
pub use session::{ResultPaths, SessionId, SessionLayout};
pub use window::{secs_to_millis, TimeWindow, WindowError};
pub use ws::{MessageData, ProgressMessage, ProgressToken, Stage};
