//! Transcripts and their reduction into text result rows.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use emolysis_models::{Language, SegmentRow};

use crate::error::MediaResult;
use crate::providers::TextAnalyzer;

/// One timed utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub id: u32,
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
    pub text: String,
}

/// Speech-to-text output for a whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub language: Language,
    #[serde(default)]
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub async fn load(path: impl AsRef<Path>) -> MediaResult<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }
}

/// Runs the language's text analyzer over transcript segments.
#[derive(Clone)]
pub struct TranscriptReducer {
    analyzer: Arc<dyn TextAnalyzer>,
}

impl TranscriptReducer {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn language(&self) -> Language {
        self.analyzer.language()
    }

    /// One row per segment, keeping the segment's own time span.
    pub async fn reduce_segment(&self, segment: &TranscriptSegment) -> MediaResult<SegmentRow> {
        let text = segment.text.trim();
        let scores = self.analyzer.analyze(text).await?;
        let observation = scores.to_observation()?;
        let normalized = observation.emotion.normalize();
        if normalized.degenerate {
            warn!(
                segment = segment.id,
                start = segment.start,
                "Text emotion sums to zero"
            );
        }
        debug!(segment = segment.id, chars = text.len(), "Reduced transcript segment");
        Ok(SegmentRow::new(
            segment.start,
            segment.end,
            observation.affect,
            normalized.vector,
        ))
    }

    pub async fn reduce(&self, transcript: &Transcript) -> MediaResult<Vec<SegmentRow>> {
        let mut rows = Vec::with_capacity(transcript.segments.len());
        for segment in &transcript.segments {
            rows.push(self.reduce_segment(segment).await?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::label_space::{LabelScore, Taxonomy, BOLD_SCALE, UNIT_SCALE};
    use crate::providers::{EmotionScores, TextScores};
    use async_trait::async_trait;
    use emolysis_models::{Emotion, NORMALIZATION_TOLERANCE};
    use std::sync::Mutex;

    struct RecordingAnalyzer {
        language: Language,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextAnalyzer for RecordingAnalyzer {
        async fn analyze(&self, text: &str) -> MediaResult<TextScores> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(match self.language {
                Language::En => TextScores {
                    emotion: EmotionScores::Named(vec![
                        LabelScore {
                            label: "joy".to_string(),
                            score: 3.0,
                        },
                        LabelScore {
                            label: "fear".to_string(),
                            score: 1.0,
                        },
                    ]),
                    valence: 0.5,
                    arousal: 0.0,
                    affect_scale: UNIT_SCALE,
                },
                Language::Zh => {
                    let mut scores = vec![0.0; 26];
                    scores[16] = 1.0;
                    TextScores {
                        emotion: EmotionScores::Indexed {
                            taxonomy: Taxonomy::Bold,
                            scores,
                        },
                        valence: 10.0,
                        arousal: 1.0,
                        affect_scale: BOLD_SCALE,
                    }
                }
            })
        }

        fn language(&self) -> Language {
            self.language
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl TextAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _text: &str) -> MediaResult<TextScores> {
            Err(MediaError::inference("model offline"))
        }

        fn language(&self) -> Language {
            Language::En
        }
    }

    fn transcript() -> Transcript {
        Transcript {
            language: Language::En,
            text: "hello there. bye".to_string(),
            segments: vec![
                TranscriptSegment {
                    id: 0,
                    start: 0.0,
                    end: 2.4,
                    text: "  hello there. ".to_string(),
                },
                TranscriptSegment {
                    id: 1,
                    start: 2.4,
                    end: 3.1,
                    text: "bye".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_english_rows_keep_segment_spans() {
        let analyzer = Arc::new(RecordingAnalyzer {
            language: Language::En,
            seen: Mutex::new(Vec::new()),
        });
        let reducer = TranscriptReducer::new(analyzer.clone());
        let rows = reducer.reduce(&transcript()).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].start, rows[0].end), (0.0, 2.4));
        assert_eq!((rows[1].start, rows[1].end), (2.4, 3.1));
        assert!((rows[0].emotion.sum() - 1.0).abs() < NORMALIZATION_TOLERANCE);
        assert_eq!(rows[0].emotion.get(Emotion::Joy), 0.75);
        assert_eq!(rows[0].valence, 500.5);
        assert_eq!(rows[0].arousal, 1.0);

        let seen = analyzer.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["hello there.".to_string(), "bye".to_string()]);
    }

    #[tokio::test]
    async fn test_chinese_rows_use_bold() {
        let reducer = TranscriptReducer::new(Arc::new(RecordingAnalyzer {
            language: Language::Zh,
            seen: Mutex::new(Vec::new()),
        }));
        let row = reducer
            .reduce_segment(&transcript().segments[1])
            .await
            .unwrap();
        assert_eq!(row.emotion.get(Emotion::Disgust), 1.0);
        assert_eq!(row.valence, 1000.0);
        assert_eq!(row.arousal, 1.0);
    }

    #[tokio::test]
    async fn test_analyzer_failure_propagates() {
        let reducer = TranscriptReducer::new(Arc::new(FailingAnalyzer));
        let err = reducer.reduce(&transcript()).await.unwrap_err();
        assert!(matches!(err, MediaError::Inference(_)));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        transcript().save(&path).await.unwrap();
        let loaded = Transcript::load(&path).await.unwrap();
        assert_eq!(loaded, transcript());
    }
}
