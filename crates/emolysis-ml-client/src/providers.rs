//! Model traits backed by the inference service.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use emolysis_media::label_space::{BOLD_SCALE, UNIT_SCALE};
use emolysis_media::{
    AudioAnalyzer, AudioClip, AudioScores, EmotionScores, FaceDetection, FaceDetector,
    FaceEmotionScorer, Frame, MediaResult, ModelRegistry, Taxonomy, TextAnalyzer, TextScores,
    Transcriber, Transcript,
};
use emolysis_models::Language;

use crate::client::MlClient;
use crate::error::{MlError, MlResult};
use crate::types::TextEmotionResponse;

#[async_trait]
impl Transcriber for MlClient {
    async fn transcribe(&self, video_path: &Path, language: Language) -> MediaResult<Transcript> {
        Ok(MlClient::transcribe(self, video_path, language).await?)
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

#[async_trait]
impl AudioAnalyzer for MlClient {
    async fn analyze(&self, clip: &AudioClip) -> MediaResult<AudioScores> {
        let response = self.audio_emotion(clip).await?;
        Ok(AudioScores {
            scores: response.scores,
            valence: response.valence,
            arousal: response.arousal,
        })
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

#[async_trait]
impl FaceDetector for MlClient {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<FaceDetection>> {
        let response = self.detect_faces(frame).await?;
        Ok(response
            .faces
            .into_iter()
            .map(|f| FaceDetection {
                bbox: f.bbox,
                confidence: f.confidence,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

#[async_trait]
impl FaceEmotionScorer for MlClient {
    async fn score(&self, face: &Frame) -> MediaResult<Vec<f64>> {
        Ok(self.face_emotion(face).await?.scores)
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

/// Text head of one language on the inference service.
pub struct MlTextAnalyzer {
    client: Arc<MlClient>,
    language: Language,
}

impl MlTextAnalyzer {
    pub fn new(client: Arc<MlClient>, language: Language) -> Self {
        Self { client, language }
    }
}

#[async_trait]
impl TextAnalyzer for MlTextAnalyzer {
    async fn analyze(&self, text: &str) -> MediaResult<TextScores> {
        let response = self.client.text_emotion(text, self.language).await?;
        Ok(text_scores(self.language, response)?)
    }

    fn language(&self) -> Language {
        self.language
    }
}

/// Interpret a text head response for `language`.
pub fn text_scores(language: Language, response: TextEmotionResponse) -> MlResult<TextScores> {
    let (emotion, affect_scale) = match language {
        Language::Zh => {
            let scores = response
                .scores
                .ok_or_else(|| MlError::invalid_response("zh text response without scores"))?;
            (
                EmotionScores::Indexed {
                    taxonomy: Taxonomy::Bold,
                    scores,
                },
                BOLD_SCALE,
            )
        }
        Language::En => {
            let labels = response
                .labels
                .ok_or_else(|| MlError::invalid_response("en text response without labels"))?;
            // Unit-scale affect goes through the same linear rescale as the
            // other heads: 0 -> 1 and 1 -> 1000 (1 + v * 999), not v * 1000.
            (EmotionScores::Named(labels), UNIT_SCALE)
        }
    };
    Ok(TextScores {
        emotion,
        valence: response.valence,
        arousal: response.arousal,
        affect_scale,
    })
}

/// Registry with every model served by `client`.
pub fn model_registry(client: Arc<MlClient>) -> ModelRegistry {
    ModelRegistry::new(
        client.clone(),
        client.clone(),
        client.clone(),
        client.clone(),
    )
    .with_text_analyzer(Arc::new(MlTextAnalyzer::new(client.clone(), Language::En)))
    .with_text_analyzer(Arc::new(MlTextAnalyzer::new(client, Language::Zh)))
}
