//! Mapping from analyzer-specific label spaces into the canonical one.
//!
//! Each source taxonomy groups its class indices into the nine canonical
//! classes. Groupings are additive: a canonical class receives the sum of the
//! source scores listed for it. Classes a taxonomy cannot express stay at 0.

use serde::{Deserialize, Serialize};

use emolysis_models::{Emotion, EmotionVector, AFFECT_MAX, AFFECT_MIN, EMOTION_CLASSES};

use crate::error::{DegenerateRangeError, MediaError, MediaResult};

/// Closed numeric interval used for valence/arousal rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffectScale {
    pub min: f64,
    pub max: f64,
}

impl AffectScale {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// BoLD dimensional annotations.
pub const BOLD_SCALE: AffectScale = AffectScale::new(1.0, 10.0);
/// AffectNet valence/arousal regression outputs.
pub const AFFECTNET_SCALE: AffectScale = AffectScale::new(-1.0, 1.0);
/// Probability-like heads reporting in `[0, 1]`.
pub const UNIT_SCALE: AffectScale = AffectScale::new(0.0, 1.0);
/// The canonical output scale.
pub const CANONICAL_SCALE: AffectScale = AffectScale::new(AFFECT_MIN, AFFECT_MAX);

/// Position of valence in a face recognizer score vector.
pub const AFFECTNET_VALENCE_INDEX: usize = 8;
/// Position of arousal in a face recognizer score vector.
pub const AFFECTNET_AROUSAL_INDEX: usize = 9;

/// Index-addressed source taxonomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    /// 26 BoLD categories (audio head, Chinese text head)
    Bold,
    /// 8 AffectNet expressions (face recognizer)
    AffectNet,
    /// 13 CPED categories
    Cped,
}

type Grouping = [&'static [usize]; EMOTION_CLASSES];

// Canonical order: fear, anger, joy, sadness, disgust, surprise, trust,
// anticipation, neutral.
const BOLD_GROUPS: Grouping = [
    &[22, 23],
    &[18, 19],
    &[0, 1, 2, 4, 5, 6, 7, 10, 15],
    &[12, 13, 14, 20, 21, 24, 25],
    &[16, 17],
    &[8, 9, 11],
    &[],
    &[3],
    &[],
];

// AffectNet: 0 anger, 1 contempt, 2 disgust, 3 fear, 4 happy, 5 neutral,
// 6 sad, 7 surprise. Contempt is folded into fear.
const AFFECTNET_GROUPS: Grouping = [&[1, 3], &[0], &[4], &[6], &[2], &[7], &[], &[], &[5]];

const CPED_GROUPS: Grouping = [
    &[7, 11],
    &[5],
    &[0, 1, 2, 3],
    &[6, 8, 12],
    &[9],
    &[10],
    &[],
    &[],
    &[4],
];

impl Taxonomy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::Bold => "bold",
            Taxonomy::AffectNet => "affectnet",
            Taxonomy::Cped => "cped",
        }
    }

    /// Number of emotion classes read from a source vector.
    pub fn class_count(&self) -> usize {
        match self {
            Taxonomy::Bold => 26,
            Taxonomy::AffectNet => 8,
            Taxonomy::Cped => 13,
        }
    }

    /// Native valence/arousal range, if the taxonomy's models report one.
    pub fn affect_scale(&self) -> Option<AffectScale> {
        match self {
            Taxonomy::Bold => Some(BOLD_SCALE),
            Taxonomy::AffectNet => Some(AFFECTNET_SCALE),
            Taxonomy::Cped => None,
        }
    }

    fn groups(&self) -> &'static Grouping {
        match self {
            Taxonomy::Bold => &BOLD_GROUPS,
            Taxonomy::AffectNet => &AFFECTNET_GROUPS,
            Taxonomy::Cped => &CPED_GROUPS,
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score for one named class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Affine rescale of `value` from `[src_min, src_max]` to `[dst_min, dst_max]`.
///
/// Values outside the source range extrapolate linearly.
pub fn translate(
    value: f64,
    src_min: f64,
    src_max: f64,
    dst_min: f64,
    dst_max: f64,
) -> Result<f64, DegenerateRangeError> {
    let src_span = src_max - src_min;
    if src_span == 0.0 || !src_span.is_finite() {
        return Err(DegenerateRangeError {
            min: src_min,
            max: src_max,
        });
    }
    Ok(dst_min + (value - src_min) / src_span * (dst_max - dst_min))
}

/// Rescale a value from `scale` into the canonical `[1, 1000]` range.
pub fn map_affect(scale: AffectScale, value: f64) -> Result<f64, DegenerateRangeError> {
    translate(
        value,
        scale.min,
        scale.max,
        CANONICAL_SCALE.min,
        CANONICAL_SCALE.max,
    )
}

pub fn map_valence(taxonomy: Taxonomy, value: f64) -> MediaResult<f64> {
    let scale = taxonomy
        .affect_scale()
        .ok_or(MediaError::NoAffectScale(taxonomy))?;
    Ok(map_affect(scale, value)?)
}

pub fn map_arousal(taxonomy: Taxonomy, value: f64) -> MediaResult<f64> {
    let scale = taxonomy
        .affect_scale()
        .ok_or(MediaError::NoAffectScale(taxonomy))?;
    Ok(map_affect(scale, value)?)
}

/// Group a source score vector into canonical classes (unnormalized).
///
/// Entries past the taxonomy's class count are ignored, so a face score
/// vector carrying valence/arousal at the tail can be passed as-is.
pub fn map_emotion(taxonomy: Taxonomy, scores: &[f64]) -> MediaResult<EmotionVector> {
    let expected = taxonomy.class_count();
    if scores.len() < expected {
        return Err(MediaError::LabelDimension {
            taxonomy,
            expected,
            actual: scores.len(),
        });
    }

    let mut out = [0.0; EMOTION_CLASSES];
    for (slot, indices) in out.iter_mut().zip(taxonomy.groups().iter()) {
        *slot = indices.iter().map(|&i| scores[i]).sum();
    }
    Ok(EmotionVector::new(out))
}

/// Map the output of a named-label classifier (unnormalized).
///
/// Labels must name a canonical class; anything else is rejected.
pub fn map_named_scores(scores: &[LabelScore]) -> MediaResult<EmotionVector> {
    let mut out = [0.0; EMOTION_CLASSES];
    for entry in scores {
        let emotion = Emotion::from_label(&entry.label)
            .ok_or_else(|| MediaError::UnknownLabel(entry.label.clone()))?;
        out[emotion.index()] += entry.score;
    }
    Ok(EmotionVector::new(out))
}
