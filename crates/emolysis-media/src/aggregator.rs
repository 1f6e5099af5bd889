//! Per-window averaging of observations.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::warn;

use emolysis_models::{AffectPair, EmotionVector, Observation, SegmentRow, TimeWindow};

/// Finalized value of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedRow {
    pub window: TimeWindow,
    pub affect: AffectPair,
    pub emotion: EmotionVector,
    /// Number of observations averaged into the row
    pub contributions: usize,
    /// The averaged emotion summed to zero and was left unnormalized
    pub degenerate: bool,
}

impl AggregatedRow {
    pub fn to_segment_row(&self) -> SegmentRow {
        SegmentRow::from_window(self.window, self.affect, self.emotion)
    }
}

/// Groups observations by exact window and averages each group.
///
/// The result does not depend on the order of `add` calls: each bucket is
/// reduced in a canonical order of its observations.
#[derive(Debug, Default)]
pub struct WindowAggregator {
    buckets: BTreeMap<TimeWindow, Vec<Observation>>,
}

impl WindowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, window: TimeWindow, observation: Observation) {
        self.buckets.entry(window).or_default().push(observation);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Average every bucket, in ascending window order.
    pub fn finalize(self) -> Vec<AggregatedRow> {
        self.buckets
            .into_iter()
            .map(|(window, mut observations)| {
                observations.sort_by(canonical_order);
                reduce_bucket(window, &observations)
            })
            .collect()
    }
}

fn reduce_bucket(window: TimeWindow, observations: &[Observation]) -> AggregatedRow {
    let count = observations.len();
    let mut emotion = EmotionVector::zeros();
    let mut valence = 0.0;
    let mut arousal = 0.0;
    for obs in observations {
        emotion = emotion.add(&obs.emotion);
        valence += obs.affect.valence;
        arousal += obs.affect.arousal;
    }

    let factor = 1.0 / count as f64;
    let normalized = emotion.scale(factor).normalize();
    if normalized.degenerate {
        warn!(window = %window, contributions = count, "Window emotion sums to zero");
    }

    AggregatedRow {
        window,
        affect: AffectPair::new(valence * factor, arousal * factor),
        emotion: normalized.vector,
        contributions: count,
        degenerate: normalized.degenerate,
    }
}

fn canonical_order(a: &Observation, b: &Observation) -> Ordering {
    a.affect
        .valence
        .total_cmp(&b.affect.valence)
        .then_with(|| a.affect.arousal.total_cmp(&b.affect.arousal))
        .then_with(|| {
            a.emotion
                .components()
                .iter()
                .zip(b.emotion.components().iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use emolysis_models::NORMALIZATION_TOLERANCE;

    fn obs(v: f64, a: f64, e: [f64; 9]) -> Observation {
        Observation::new(EmotionVector::new(e), AffectPair::new(v, a))
    }

    fn window(start: u64, end: u64) -> TimeWindow {
        TimeWindow::from_millis(start, end).unwrap()
    }

    fn sample() -> Vec<(TimeWindow, Observation)> {
        vec![
            (window(0, 7500), obs(100.0, 200.0, [0.1, 0.2, 0.3, 0.0, 0.0, 0.0, 0.0, 0.2, 0.1])),
            (window(7500, 15000), obs(100.0, 200.0, [0.1, 0.2, 0.3, 0.0, 0.0, 0.0, 0.0, 0.2, 0.1])),
            (window(7500, 15000), obs(333.3, 917.1, [0.7, 0.0, 0.05, 0.11, 0.0, 0.0, 0.0, 0.0, 0.3])),
            (window(7500, 15000), obs(1.1, 12.9, [0.01, 0.2, 0.0, 0.3, 0.9, 0.0, 0.0, 0.0, 0.0])),
            (window(15000, 20000), obs(333.3, 917.1, [0.7, 0.0, 0.05, 0.11, 0.0, 0.0, 0.0, 0.0, 0.3])),
        ]
    }

    #[test]
    fn test_rows_sum_to_one() {
        let mut agg = WindowAggregator::new();
        for (w, o) in sample() {
            agg.add(w, o);
        }
        let rows = agg.finalize();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(!row.degenerate);
            assert!((row.emotion.sum() - 1.0).abs() < NORMALIZATION_TOLERANCE);
        }
        assert_eq!(rows[1].contributions, 3);
    }

    #[test]
    fn test_mean_of_affect() {
        let mut agg = WindowAggregator::new();
        agg.add(window(0, 7500), obs(100.0, 10.0, [1.0; 9]));
        agg.add(window(0, 7500), obs(300.0, 30.0, [1.0; 9]));
        let rows = agg.finalize();
        assert_eq!(rows[0].affect, AffectPair::new(200.0, 20.0));
    }

    #[test]
    fn test_permutation_invariant() {
        let forward = {
            let mut agg = WindowAggregator::new();
            for (w, o) in sample() {
                agg.add(w, o);
            }
            agg.finalize()
        };
        let reversed = {
            let mut agg = WindowAggregator::new();
            for (w, o) in sample().into_iter().rev() {
                agg.add(w, o);
            }
            agg.finalize()
        };
        let shuffled = {
            let mut items = sample();
            items.swap(1, 3);
            items.swap(0, 2);
            let mut agg = WindowAggregator::new();
            for (w, o) in items {
                agg.add(w, o);
            }
            agg.finalize()
        };
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_ascending_window_order() {
        let mut agg = WindowAggregator::new();
        for (w, o) in sample().into_iter().rev() {
            agg.add(w, o);
        }
        let starts: Vec<u64> = agg.finalize().iter().map(|r| r.window.start_ms()).collect();
        assert_eq!(starts, vec![0, 7500, 15000]);
    }

    #[test]
    fn test_zero_emotion_is_flagged() {
        let mut agg = WindowAggregator::new();
        agg.add(window(0, 7500), obs(1.0, 1.0, [0.0; 9]));
        let rows = agg.finalize();
        assert!(rows[0].degenerate);
        assert!(rows[0].emotion.is_zero());
    }

    #[test]
    fn test_segment_row_uses_seconds() {
        let mut agg = WindowAggregator::new();
        agg.add(window(7500, 20000), obs(1.0, 2.0, [1.0; 9]));
        let row = agg.finalize()[0].to_segment_row();
        assert_eq!(row.start, 7.5);
        assert_eq!(row.end, 20.0);
    }
}
