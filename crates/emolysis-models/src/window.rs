//! Time windows keyed on integer milliseconds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error building a [`TimeWindow`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("window bounds must be finite and non-negative: start={start}, end={end}")]
    InvalidBound { start: f64, end: f64 },

    #[error("window is empty: start_ms={start_ms}, end_ms={end_ms}")]
    Empty { start_ms: u64, end_ms: u64 },
}

/// Half-open time span `[start, end)`.
///
/// Boundaries are whole milliseconds so that windows computed on different
/// code paths compare equal exactly. Ordering is by start, then end.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct TimeWindow {
    start_ms: u64,
    end_ms: u64,
}

impl TimeWindow {
    /// Build a window from millisecond bounds.
    pub fn from_millis(start_ms: u64, end_ms: u64) -> Result<Self, WindowError> {
        if start_ms >= end_ms {
            return Err(WindowError::Empty { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Build a window from seconds, truncating each bound to the millisecond.
    pub fn from_secs(start: f64, end: f64) -> Result<Self, WindowError> {
        let start_ms = secs_to_millis(start).ok_or(WindowError::InvalidBound { start, end })?;
        let end_ms = secs_to_millis(end).ok_or(WindowError::InvalidBound { start, end })?;
        Self::from_millis(start_ms, end_ms)
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.start_secs(), self.end_secs())
    }
}

/// Convert seconds to whole milliseconds, truncating toward zero.
pub fn secs_to_millis(secs: f64) -> Option<u64> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_truncates() {
        let w = TimeWindow::from_secs(7.5, 15.0009).unwrap();
        assert_eq!(w.start_ms(), 7500);
        assert_eq!(w.end_ms(), 15000);
        assert_eq!(w.duration_ms(), 7500);
    }

    #[test]
    fn test_equal_windows_from_different_paths() {
        let a = TimeWindow::from_secs(0.0 + 7.5, 15.0).unwrap();
        let b = TimeWindow::from_millis(7500, 15000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_empty_and_invalid() {
        assert!(matches!(
            TimeWindow::from_millis(10, 10),
            Err(WindowError::Empty { .. })
        ));
        assert!(matches!(
            TimeWindow::from_secs(-1.0, 2.0),
            Err(WindowError::InvalidBound { .. })
        ));
        assert!(TimeWindow::from_secs(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_ordering_by_start_then_end() {
        let a = TimeWindow::from_millis(0, 7500).unwrap();
        let b = TimeWindow::from_millis(7500, 15000).unwrap();
        let c = TimeWindow::from_millis(7500, 20000).unwrap();
        let mut v = vec![c, b, a];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn test_display() {
        let w = TimeWindow::from_millis(7500, 20000).unwrap();
        assert_eq!(w.to_string(), "[7.500, 20.000)");
    }
}
