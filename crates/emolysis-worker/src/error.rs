//! Worker error types.

use std::time::Duration;

use thiserror::Error;

use emolysis_models::UnsupportedLanguageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Client disconnected")]
    Disconnected,

    #[error("No acknowledgment within {0:?}")]
    AckTimeout(Duration),

    #[error("Progress protocol misuse: {0}")]
    Protocol(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguageError),

    #[error("Media error: {0}")]
    Media(#[from] emolysis_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// The client is gone; nothing can be reported back.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, WorkerError::Disconnected)
    }
}
