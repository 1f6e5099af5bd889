//! Interfaces of the external models and the registry that holds them.
//!
//! The pipeline only talks to models through these traits; concrete
//! implementations live elsewhere (the inference service client, test fakes).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use emolysis_models::{AffectPair, Language, Observation, UnsupportedLanguageError};

use crate::decode::{AudioClip, Frame};
use crate::error::{MediaError, MediaResult};
use crate::label_space::{self, AffectScale, LabelScore, Taxonomy};
use crate::transcript::Transcript;

/// Raw output of the audio emotion head.
///
/// Scores follow the BoLD 26-class taxonomy; valence and arousal are on the
/// BoLD `[1, 10]` scale.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioScores {
    pub scores: Vec<f64>,
    pub valence: f64,
    pub arousal: f64,
}

impl AudioScores {
    /// Map to the canonical space; the emotion part is left unnormalized.
    pub fn to_observation(&self) -> MediaResult<Observation> {
        let emotion = label_space::map_emotion(Taxonomy::Bold, &self.scores)?;
        let affect = AffectPair::new(
            label_space::map_valence(Taxonomy::Bold, self.valence)?,
            label_space::map_arousal(Taxonomy::Bold, self.arousal)?,
        );
        Ok(Observation::new(emotion, affect))
    }
}

/// Emotion part of a text analyzer result.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionScores {
    /// Score vector of an index-addressed taxonomy
    Indexed { taxonomy: Taxonomy, scores: Vec<f64> },
    /// Named-label classifier output
    Named(Vec<LabelScore>),
}

/// Raw output of a text emotion head.
#[derive(Debug, Clone, PartialEq)]
pub struct TextScores {
    pub emotion: EmotionScores,
    pub valence: f64,
    pub arousal: f64,
    /// Scale valence and arousal are reported on
    pub affect_scale: AffectScale,
}

impl TextScores {
    /// Map to the canonical space; the emotion part is left unnormalized.
    pub fn to_observation(&self) -> MediaResult<Observation> {
        let emotion = match &self.emotion {
            EmotionScores::Indexed { taxonomy, scores } => {
                label_space::map_emotion(*taxonomy, scores)?
            }
            EmotionScores::Named(labels) => label_space::map_named_scores(labels)?,
        };
        let affect = AffectPair::new(
            label_space::map_affect(self.affect_scale, self.valence)?,
            label_space::map_affect(self.affect_scale, self.arousal)?,
        );
        Ok(Observation::new(emotion, affect))
    }
}

/// A face candidate returned by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    /// `[x1, y1, x2, y2]` in frame pixels; may extend past the frame
    pub bbox: [f64; 4],
    pub confidence: f64,
}

/// Speech-to-text over a whole video.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video_path: &Path, language: Language) -> MediaResult<Transcript>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Audio emotion head over a PCM clip.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze(&self, clip: &AudioClip) -> MediaResult<AudioScores>;

    fn name(&self) -> &'static str;
}

/// Text emotion head for one language.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> MediaResult<TextScores>;

    fn language(&self) -> Language;
}

/// Face detector over a full RGB frame.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<FaceDetection>>;

    fn name(&self) -> &'static str;
}

/// Face emotion recognizer over a face crop.
///
/// Returns the 8 AffectNet expression scores followed by valence and
/// arousal in `[-1, 1]`.
#[async_trait]
pub trait FaceEmotionScorer: Send + Sync {
    async fn score(&self, face: &Frame) -> MediaResult<Vec<f64>>;

    fn name(&self) -> &'static str;
}

/// Models shared by every session.
///
/// Built once at start-up and handed out behind `Arc`s; nothing in the
/// pipeline constructs or caches models on its own.
#[derive(Clone)]
pub struct ModelRegistry {
    transcriber: Arc<dyn Transcriber>,
    audio: Arc<dyn AudioAnalyzer>,
    text: HashMap<Language, Arc<dyn TextAnalyzer>>,
    face_detector: Arc<dyn FaceDetector>,
    face_scorer: Arc<dyn FaceEmotionScorer>,
}

impl ModelRegistry {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        audio: Arc<dyn AudioAnalyzer>,
        face_detector: Arc<dyn FaceDetector>,
        face_scorer: Arc<dyn FaceEmotionScorer>,
    ) -> Self {
        Self {
            transcriber,
            audio,
            text: HashMap::new(),
            face_detector,
            face_scorer,
        }
    }

    /// Register the text analyzer for its language, replacing any previous one.
    pub fn with_text_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.text.insert(analyzer.language(), analyzer);
        self
    }

    pub fn transcriber(&self) -> Arc<dyn Transcriber> {
        Arc::clone(&self.transcriber)
    }

    pub fn audio_analyzer(&self) -> Arc<dyn AudioAnalyzer> {
        Arc::clone(&self.audio)
    }

    pub fn text_analyzer(&self, language: Language) -> MediaResult<Arc<dyn TextAnalyzer>> {
        self.text
            .get(&language)
            .cloned()
            .ok_or_else(|| MediaError::from(UnsupportedLanguageError(language.to_string())))
    }

    pub fn face_detector(&self) -> Arc<dyn FaceDetector> {
        Arc::clone(&self.face_detector)
    }

    pub fn face_scorer(&self) -> Arc<dyn FaceEmotionScorer> {
        Arc::clone(&self.face_scorer)
    }

    /// Languages with a registered text analyzer.
    pub fn languages(&self) -> Vec<Language> {
        let mut langs: Vec<Language> = self.text.keys().copied().collect();
        langs.sort_by_key(|l| l.as_str());
        langs
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("transcriber", &self.transcriber.name())
            .field("audio", &self.audio.name())
            .field("text", &self.languages())
            .field("face_detector", &self.face_detector.name())
            .field("face_scorer", &self.face_scorer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_space::{BOLD_SCALE, UNIT_SCALE};
    use emolysis_models::Emotion;

    #[test]
    fn test_audio_scores_map_to_bold() {
        let mut scores = vec![0.0; 26];
        scores[3] = 0.5;
        scores[22] = 0.25;
        let obs = AudioScores {
            scores,
            valence: 5.5,
            arousal: 10.0,
        }
        .to_observation()
        .unwrap();
        assert_eq!(obs.emotion.get(Emotion::Anticipation), 0.5);
        assert_eq!(obs.emotion.get(Emotion::Fear), 0.25);
        assert_eq!(obs.affect, AffectPair::new(500.5, 1000.0));
    }

    #[test]
    fn test_text_scores_named_unit_scale() {
        let obs = TextScores {
            emotion: EmotionScores::Named(vec![LabelScore {
                label: "sadness".to_string(),
                score: 0.9,
            }]),
            valence: 0.0,
            arousal: 1.0,
            affect_scale: UNIT_SCALE,
        }
        .to_observation()
        .unwrap();
        assert_eq!(obs.emotion.get(Emotion::Sadness), 0.9);
        assert_eq!(obs.affect, AffectPair::new(1.0, 1000.0));
    }

    #[test]
    fn test_text_scores_indexed() {
        let obs = TextScores {
            emotion: EmotionScores::Indexed {
                taxonomy: Taxonomy::Bold,
                scores: vec![1.0; 26],
            },
            valence: 1.0,
            arousal: 1.0,
            affect_scale: BOLD_SCALE,
        }
        .to_observation()
        .unwrap();
        assert_eq!(obs.emotion.sum(), 26.0);
        assert_eq!(obs.affect, AffectPair::new(1.0, 1.0));
    }
}
