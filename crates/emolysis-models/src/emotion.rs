//! Canonical emotion representation.
//!
//! Every analyzer output is reduced into the same shape: a 9-class emotion
//! distribution plus a (valence, arousal) pair on a common continuous scale.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of canonical emotion classes.
pub const EMOTION_CLASSES: usize = 9;

/// Lower bound of the canonical valence/arousal scale.
pub const AFFECT_MIN: f64 = 1.0;

/// Upper bound of the canonical valence/arousal scale.
pub const AFFECT_MAX: f64 = 1000.0;

/// Tolerance used when checking that a distribution sums to one.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Canonical emotion classes, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Fear,
    Anger,
    Joy,
    Sadness,
    Disgust,
    Surprise,
    Trust,
    Anticipation,
    Neutral,
}

impl Emotion {
    /// All classes in canonical order.
    pub const ALL: [Emotion; EMOTION_CLASSES] = [
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Disgust,
        Emotion::Surprise,
        Emotion::Trust,
        Emotion::Anticipation,
        Emotion::Neutral,
    ];

    /// Position of this class in an [`EmotionVector`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Fear => "fear",
            Emotion::Anger => "anger",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Disgust => "disgust",
            Emotion::Surprise => "surprise",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a class name as emitted by named-label classifiers.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 9-class emotion distribution in canonical order.
///
/// Values are immutable once built; normalization returns a new vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EmotionVector([f64; EMOTION_CLASSES]);

impl EmotionVector {
    pub fn new(components: [f64; EMOTION_CLASSES]) -> Self {
        Self(components)
    }

    pub fn zeros() -> Self {
        Self([0.0; EMOTION_CLASSES])
    }

    pub fn components(&self) -> &[f64; EMOTION_CLASSES] {
        &self.0
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion.index()]
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Scale the components so they sum to one.
    ///
    /// An all-zero (or non-positive sum) vector cannot be normalized; it is
    /// returned unchanged and reported through [`Normalized::degenerate`].
    pub fn normalize(&self) -> Normalized {
        let total = self.sum();
        if total > 0.0 && total.is_finite() {
            let mut out = self.0;
            for v in out.iter_mut() {
                *v /= total;
            }
            Normalized {
                vector: Self(out),
                degenerate: false,
            }
        } else {
            Normalized {
                vector: *self,
                degenerate: true,
            }
        }
    }

    /// Component-wise sum.
    pub fn add(&self, other: &EmotionVector) -> EmotionVector {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
        Self(out)
    }

    /// Multiply every component by `factor`.
    pub fn scale(&self, factor: f64) -> EmotionVector {
        let mut out = self.0;
        for v in out.iter_mut() {
            *v *= factor;
        }
        Self(out)
    }
}

impl From<[f64; EMOTION_CLASSES]> for EmotionVector {
    fn from(components: [f64; EMOTION_CLASSES]) -> Self {
        Self(components)
    }
}

/// Result of [`EmotionVector::normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub vector: EmotionVector,
    /// The input summed to zero and could not be scaled.
    pub degenerate: bool,
}

/// Valence and arousal on the canonical `[1, 1000]` scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AffectPair {
    pub valence: f64,
    pub arousal: f64,
}

impl AffectPair {
    pub fn new(valence: f64, arousal: f64) -> Self {
        Self { valence, arousal }
    }
}

/// One analyzer invocation, already mapped to the canonical space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Observation {
    pub emotion: EmotionVector,
    pub affect: AffectPair,
}

impl Observation {
    pub fn new(emotion: EmotionVector, affect: AffectPair) -> Self {
        Self { emotion, affect }
    }
}
