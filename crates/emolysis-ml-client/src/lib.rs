//! Client for the emotion inference service.
//!
//! The service hosts the speech, text and face models. This crate wraps its
//! HTTP API and implements the model traits from `emolysis-media` on top of
//! it, so the pipeline can run against a [`ModelRegistry`] built here.
//!
//! [`ModelRegistry`]: emolysis_media::ModelRegistry

pub mod client;
pub mod error;
pub mod providers;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use providers::{model_registry, MlTextAnalyzer};
