//! Emotion analysis session pipeline.
//!
//! This crate provides:
//! - The lockstep progress protocol and its transports
//! - The session processor (transcription, audio, text and visual stages)
//! - Session id allocation and bounded inference concurrency
//! - Structured session logging and pipeline metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod progress;
pub mod session;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::InferencePool;
pub use logging::SessionLogger;
pub use processor::SessionProcessor;
pub use progress::{
    AutoAckTransport, ChannelTransport, ClientEnd, ProgressProtocol, ProgressTransport,
    ProtocolState, StageCursor,
};
pub use session::SessionIdPool;
