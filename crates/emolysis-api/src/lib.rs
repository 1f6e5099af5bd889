//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - The upload + progress WebSocket driving analysis sessions
//! - Session file serving with byte ranges for videos
//! - Health/readiness probes and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod range;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
