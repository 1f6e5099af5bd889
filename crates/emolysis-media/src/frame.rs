//! Per-frame face detection and emotion scoring.

use std::sync::Arc;

use image::imageops;
use tracing::{debug, info, warn};

use emolysis_models::FaceRow;

use crate::decode::Frame;
use crate::error::{MediaError, MediaResult};
use crate::label_space::{
    self, Taxonomy, AFFECTNET_AROUSAL_INDEX, AFFECTNET_VALENCE_INDEX,
};
use crate::providers::{FaceDetection, FaceDetector, FaceEmotionScorer};

/// Detections at or below this confidence are dropped.
pub const DEFAULT_FACE_THRESHOLD: f64 = 0.9;

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop rectangle for integer box corners.
///
/// The top-left corner is clamped to 0; the bottom-right stops at the frame
/// edge. Returns `None` when nothing is left.
pub fn crop_region(
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    frame_width: u32,
    frame_height: u32,
) -> Option<CropRegion> {
    let x0 = i64::from(x1.max(0));
    let y0 = i64::from(y1.max(0));
    let x_end = i64::from(x2).min(i64::from(frame_width));
    let y_end = i64::from(y2).min(i64::from(frame_height));
    if x_end <= x0 || y_end <= y0 {
        return None;
    }
    Some(CropRegion {
        x: x0 as u32,
        y: y0 as u32,
        width: (x_end - x0) as u32,
        height: (y_end - y0) as u32,
    })
}

/// Turns one frame into zero or more face rows.
#[derive(Clone)]
pub struct FrameReducer {
    detector: Arc<dyn FaceDetector>,
    scorer: Arc<dyn FaceEmotionScorer>,
    threshold: f64,
}

impl FrameReducer {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        scorer: Arc<dyn FaceEmotionScorer>,
        threshold: f64,
    ) -> Self {
        Self {
            detector,
            scorer,
            threshold,
        }
    }

    pub async fn reduce(&self, frame_index: u64, frame: &Frame) -> MediaResult<Vec<FaceRow>> {
        let detections = self.detector.detect(frame).await?;
        let mut rows = Vec::new();

        for detection in detections
            .iter()
            .filter(|d| d.confidence > self.threshold)
        {
            if let Some(row) = self.reduce_face(frame_index, frame, detection).await? {
                rows.push(row);
            }
        }

        if rows.is_empty() {
            debug!(frame = frame_index, candidates = detections.len(), "No face detected");
        }
        Ok(rows)
    }

    async fn reduce_face(
        &self,
        frame_index: u64,
        frame: &Frame,
        detection: &FaceDetection,
    ) -> MediaResult<Option<FaceRow>> {
        let [x1, y1, x2, y2] = detection.bbox.map(|v| v as i32);

        let Some(region) = crop_region(x1, y1, x2, y2, frame.width(), frame.height()) else {
            info!(frame = frame_index, x1, y1, x2, y2, "Empty face crop, skipping");
            return Ok(None);
        };

        let face = imageops::crop_imm(frame, region.x, region.y, region.width, region.height)
            .to_image();
        let scores = self.scorer.score(&face).await?;
        if scores.len() <= AFFECTNET_AROUSAL_INDEX {
            return Err(MediaError::LabelDimension {
                taxonomy: Taxonomy::AffectNet,
                expected: AFFECTNET_AROUSAL_INDEX + 1,
                actual: scores.len(),
            });
        }

        let normalized = label_space::map_emotion(Taxonomy::AffectNet, &scores)?.normalize();
        if normalized.degenerate {
            warn!(frame = frame_index, x1, y1, x2, y2, "Face emotion sums to zero");
        }
        let emotion = normalized.vector;
        let valence =
            label_space::map_valence(Taxonomy::AffectNet, scores[AFFECTNET_VALENCE_INDEX])?;
        let arousal =
            label_space::map_arousal(Taxonomy::AffectNet, scores[AFFECTNET_AROUSAL_INDEX])?;

        Ok(Some(FaceRow {
            frame: frame_index,
            x1,
            y1,
            x2,
            y2,
            box_prob: detection.confidence,
            emotion,
            valence: valence.trunc() as i64,
            arousal: arousal.trunc() as i64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use emolysis_models::{Emotion, NORMALIZATION_TOLERANCE};
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(Vec<FaceDetection>);

    #[async_trait]
    impl FaceDetector for FixedDetector {
        async fn detect(&self, _frame: &Frame) -> MediaResult<Vec<FaceDetection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct HappyScorer {
        calls: AtomicUsize,
        last_size: std::sync::Mutex<Option<(u32, u32)>>,
    }

    #[async_trait]
    impl FaceEmotionScorer for HappyScorer {
        async fn score(&self, face: &Frame) -> MediaResult<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_size.lock().unwrap() = Some(face.dimensions());
            // anger, contempt, disgust, fear, happy, neutral, sad, surprise, valence, arousal
            Ok(vec![0.0, 0.1, 0.0, 0.1, 0.6, 0.2, 0.0, 0.0, 0.5, -1.0])
        }

        fn name(&self) -> &'static str {
            "happy"
        }
    }

    fn reducer(detections: Vec<FaceDetection>) -> (FrameReducer, Arc<HappyScorer>) {
        let scorer = Arc::new(HappyScorer::default());
        let reducer = FrameReducer::new(
            Arc::new(FixedDetector(detections)),
            scorer.clone(),
            DEFAULT_FACE_THRESHOLD,
        );
        (reducer, scorer)
    }

    fn frame() -> Frame {
        RgbImage::new(64, 48)
    }

    #[tokio::test]
    async fn test_confident_face_yields_row() {
        let (reducer, scorer) = reducer(vec![FaceDetection {
            bbox: [10.7, 5.2, 30.9, 40.1],
            confidence: 0.95,
        }]);
        let rows = reducer.reduce(7, &frame()).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows[0];
        assert_eq!(row.frame, 7);
        assert_eq!((row.x1, row.y1, row.x2, row.y2), (10, 5, 30, 40));
        assert_eq!(row.box_prob, 0.95);
        assert!((row.emotion.sum() - 1.0).abs() < NORMALIZATION_TOLERANCE);
        assert!((row.emotion.get(Emotion::Joy) - 0.6).abs() < 1e-12);
        assert!((row.emotion.get(Emotion::Fear) - 0.2).abs() < 1e-12);
        // 0.5 on [-1, 1] -> 750.25, truncated
        assert_eq!(row.valence, 750);
        assert_eq!(row.arousal, 1);
        assert_eq!(*scorer.last_size.lock().unwrap(), Some((20, 35)));
    }

    #[tokio::test]
    async fn test_low_confidence_face_is_dropped() {
        let (reducer, scorer) = reducer(vec![FaceDetection {
            bbox: [10.0, 5.0, 30.0, 40.0],
            confidence: 0.5,
        }]);
        let rows = reducer.reduce(0, &frame()).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let (reducer, _) = reducer(vec![FaceDetection {
            bbox: [10.0, 5.0, 30.0, 40.0],
            confidence: 0.9,
        }]);
        assert!(reducer.reduce(0, &frame()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_corner_is_clamped_for_crop_only() {
        let (reducer, scorer) = reducer(vec![FaceDetection {
            bbox: [-4.0, -2.0, 10.0, 12.0],
            confidence: 0.99,
        }]);
        let rows = reducer.reduce(1, &frame()).await.unwrap();
        assert_eq!((rows[0].x1, rows[0].y1), (-4, -2));
        assert_eq!(*scorer.last_size.lock().unwrap(), Some((10, 12)));
    }

    #[tokio::test]
    async fn test_empty_crop_is_skipped() {
        let (reducer, scorer) = reducer(vec![
            FaceDetection {
                bbox: [20.0, 20.0, 20.0, 30.0],
                confidence: 0.99,
            },
            FaceDetection {
                bbox: [1.0, 1.0, 11.0, 11.0],
                confidence: 0.97,
            },
        ]);
        let rows = reducer.reduce(2, &frame()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].box_prob, 0.97);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    struct BlankScorer;

    #[async_trait]
    impl FaceEmotionScorer for BlankScorer {
        async fn score(&self, _face: &Frame) -> MediaResult<Vec<f64>> {
            Ok(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 1.0])
        }

        fn name(&self) -> &'static str {
            "blank"
        }
    }

    #[tokio::test]
    async fn test_zero_face_scores_are_kept_unnormalized() {
        let reducer = FrameReducer::new(
            Arc::new(FixedDetector(vec![FaceDetection {
                bbox: [10.0, 5.0, 30.0, 40.0],
                confidence: 0.95,
            }])),
            Arc::new(BlankScorer),
            DEFAULT_FACE_THRESHOLD,
        );
        let rows = reducer.reduce(3, &frame()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].emotion.is_zero());
        assert_eq!((rows[0].valence, rows[0].arousal), (1, 1000));
    }

    #[test]
    fn test_crop_region_stops_at_frame_edge() {
        assert_eq!(
            crop_region(50, 40, 90, 80, 64, 48),
            Some(CropRegion {
                x: 50,
                y: 40,
                width: 14,
                height: 8
            })
        );
        assert_eq!(crop_region(70, 0, 90, 10, 64, 48), None);
        assert_eq!(crop_region(-10, -10, -1, 5, 64, 48), None);
    }
}
