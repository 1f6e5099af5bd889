//! Overlapping audio analysis windows and their mapping onto the output grid.
//!
//! Windows are `window` long and start every `stride`. Each analyzed window
//! is reported on a grid of `stride`-sized cells: a full window covers two
//! cells and contributes the same observation to both, so interior cells are
//! averaged over two neighbouring windows.

use emolysis_models::{secs_to_millis, TimeWindow};

use crate::error::{MediaError, MediaResult};

/// Default distance between window starts, in seconds.
pub const DEFAULT_STRIDE_SECS: f64 = 7.5;
/// Default analysis window length, in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 15.0;

/// One window to run the audio analyzer on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    /// Zero-based position in the sequence
    pub index: usize,
    pub window: TimeWindow,
}

/// Grid cells that receive an analyzed window's observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSplit {
    /// `[start, mid)` and `[mid, end)`
    Halves(TimeWindow, TimeWindow),
    /// The window has no second half inside the asset
    Whole(TimeWindow),
}

impl GridSplit {
    pub fn cells(&self) -> Vec<TimeWindow> {
        match *self {
            GridSplit::Halves(a, b) => vec![a, b],
            GridSplit::Whole(w) => vec![w],
        }
    }
}

/// Produces analysis windows for an asset of known duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSegmenter {
    stride_ms: u64,
    window_ms: u64,
}

impl Default for AudioSegmenter {
    fn default() -> Self {
        Self {
            stride_ms: 7_500,
            window_ms: 15_000,
        }
    }
}

impl AudioSegmenter {
    /// Requires `0 < stride < window`.
    pub fn new(stride_secs: f64, window_secs: f64) -> MediaResult<Self> {
        let stride_ms = secs_to_millis(stride_secs).unwrap_or(0);
        let window_ms = secs_to_millis(window_secs).unwrap_or(0);
        if stride_ms == 0 || window_ms <= stride_ms {
            return Err(MediaError::internal(format!(
                "segmenter needs 0 < stride < window, got stride={}s window={}s",
                stride_secs, window_secs
            )));
        }
        Ok(Self {
            stride_ms,
            window_ms,
        })
    }

    /// Lazy sequence of analysis windows over `[0, total)`.
    ///
    /// The sequence ends with the first window that reaches the end of the
    /// asset. It can be cloned to restart from the same position.
    pub fn segment(&self, total_secs: f64) -> Segments {
        Segments {
            next_start: 0,
            total_ms: secs_to_millis(total_secs).unwrap_or(0),
            stride_ms: self.stride_ms,
            window_ms: self.window_ms,
            index: 0,
            finished: false,
        }
    }

    /// Number of windows [`segment`](Self::segment) yields.
    pub fn window_count(&self, total_secs: f64) -> usize {
        self.segment(total_secs).count()
    }

    /// Grid cells for an analyzed window of an asset `total_ms` long.
    pub fn split(&self, window: TimeWindow, total_ms: u64) -> MediaResult<GridSplit> {
        let mid = window.start_ms() + self.stride_ms;
        if mid < total_ms && mid < window.end_ms() {
            Ok(GridSplit::Halves(
                TimeWindow::from_millis(window.start_ms(), mid)?,
                TimeWindow::from_millis(mid, window.end_ms())?,
            ))
        } else {
            Ok(GridSplit::Whole(window))
        }
    }
}

/// Iterator returned by [`AudioSegmenter::segment`].
#[derive(Debug, Clone)]
pub struct Segments {
    next_start: u64,
    total_ms: u64,
    stride_ms: u64,
    window_ms: u64,
    index: usize,
    finished: bool,
}

impl Segments {
    /// Asset duration in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }
}

impl Iterator for Segments {
    type Item = AnalysisWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_start >= self.total_ms {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.window_ms).min(self.total_ms);
        if end >= self.total_ms {
            self.finished = true;
        }
        let window = TimeWindow::from_millis(start, end).ok()?;
        let item = AnalysisWindow {
            index: self.index,
            window,
        };
        self.index += 1;
        self.next_start += self.stride_ms;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(start: u64, end: u64) -> TimeWindow {
        TimeWindow::from_millis(start, end).unwrap()
    }

    #[test]
    fn test_twenty_second_asset() {
        let seg = AudioSegmenter::default();
        let windows: Vec<TimeWindow> = seg.segment(20.0).map(|a| a.window).collect();
        assert_eq!(windows, vec![w(0, 15_000), w(7_500, 20_000)]);

        assert_eq!(
            seg.split(windows[0], 20_000).unwrap(),
            GridSplit::Halves(w(0, 7_500), w(7_500, 15_000))
        );
        assert_eq!(
            seg.split(windows[1], 20_000).unwrap(),
            GridSplit::Halves(w(7_500, 15_000), w(15_000, 20_000))
        );
    }

    #[test]
    fn test_grid_contributions() {
        let seg = AudioSegmenter::default();
        let mut counts = std::collections::BTreeMap::new();
        for a in seg.segment(20.0) {
            for cell in seg.split(a.window, 20_000).unwrap().cells() {
                *counts.entry(cell).or_insert(0) += 1;
            }
        }
        let counts: Vec<(TimeWindow, i32)> = counts.into_iter().collect();
        assert_eq!(
            counts,
            vec![
                (w(0, 7_500), 1),
                (w(7_500, 15_000), 2),
                (w(15_000, 20_000), 1)
            ]
        );
    }

    #[test]
    fn test_short_asset_single_cell() {
        let seg = AudioSegmenter::default();
        let windows: Vec<_> = seg.segment(5.0).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].window, w(0, 5_000));
        assert_eq!(
            seg.split(windows[0].window, 5_000).unwrap(),
            GridSplit::Whole(w(0, 5_000))
        );
    }

    #[test]
    fn test_exact_multiple_of_window() {
        let seg = AudioSegmenter::default();
        let windows: Vec<_> = seg.segment(30.0).map(|a| a.window).collect();
        assert_eq!(
            windows,
            vec![w(0, 15_000), w(7_500, 22_500), w(15_000, 30_000)]
        );
        assert_eq!(seg.window_count(30.0), 3);
    }

    #[test]
    fn test_empty_asset() {
        let seg = AudioSegmenter::default();
        assert_eq!(seg.segment(0.0).count(), 0);
        assert_eq!(seg.segment(-3.0).count(), 0);
    }

    #[test]
    fn test_restartable() {
        let seg = AudioSegmenter::default();
        let mut it = seg.segment(40.0);
        let snapshot = it.clone();
        let first: Vec<_> = it.by_ref().collect();
        let again: Vec<_> = snapshot.collect();
        assert_eq!(first, again);
        assert_eq!(first.last().unwrap().index, first.len() - 1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(AudioSegmenter::new(0.0, 15.0).is_err());
        assert!(AudioSegmenter::new(15.0, 15.0).is_err());
        assert!(AudioSegmenter::new(5.0, 10.0).is_ok());
    }
}
