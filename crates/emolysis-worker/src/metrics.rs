//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host process installs a recorder.

use metrics::{counter, histogram};

use emolysis_models::Stage;

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_DURATION_SECONDS: &str = "emolysis_stage_duration_seconds";
    pub const ROWS_WRITTEN_TOTAL: &str = "emolysis_rows_written_total";
    pub const SESSIONS_COMPLETED_TOTAL: &str = "emolysis_sessions_completed_total";
    pub const SESSIONS_FAILED_TOTAL: &str = "emolysis_sessions_failed_total";
}

/// Record how long a stage took.
pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rows written to a stage's table.
pub fn record_rows_written(stage: Stage, rows: usize) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::ROWS_WRITTEN_TOTAL, &labels).increment(rows as u64);
}

pub fn record_session_completed() {
    counter!(names::SESSIONS_COMPLETED_TOTAL).increment(1);
}

/// Record a failed session; `reason` is a short error class.
pub fn record_session_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SESSIONS_FAILED_TOTAL, &labels).increment(1);
}
