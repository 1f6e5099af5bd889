//! Structured session logging utilities.

use tracing::{error, info, warn, Span};

use emolysis_models::{SessionId, Stage};

/// Session logger attaching the session id (and stage, once set) to
/// lifecycle events.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: SessionId,
    stage: Option<Stage>,
}

impl SessionLogger {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            stage: None,
        }
    }

    /// Logger for one stage of the same session.
    pub fn for_stage(&self, stage: Stage) -> Self {
        Self {
            session_id: self.session_id,
            stage: Some(stage),
        }
    }

    fn stage_label(&self) -> &'static str {
        self.stage.map(|s| s.as_str()).unwrap_or("session")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            stage = self.stage_label(),
            "Started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            stage = self.stage_label(),
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            stage = self.stage_label(),
            "Error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            stage = self.stage_label(),
            "Completed: {}", message
        );
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Span covering the whole session.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("session", session_id = %self.session_id)
    }
}
