//! Application state.

use std::sync::Arc;

use emolysis_media::FfmpegDecoder;
use emolysis_ml_client::{model_registry, MlClient};
use emolysis_worker::{PipelineConfig, SessionIdPool, SessionProcessor};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub processor: Arc<SessionProcessor>,
    pub sessions: Arc<SessionIdPool>,
    /// Inference service client, checked by the readiness probe
    pub ml_client: Option<Arc<MlClient>>,
}

impl AppState {
    /// Create new application state backed by the inference service.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let pipeline = PipelineConfig {
            data_dir: config.data_dir.clone(),
            ..PipelineConfig::from_env()
        };
        let client = Arc::new(MlClient::from_env()?);
        let processor = SessionProcessor::new(
            pipeline,
            model_registry(Arc::clone(&client)),
            Arc::new(FfmpegDecoder::new()),
        )?;
        let sessions = SessionIdPool::open(&config.data_dir).await?;

        Ok(Self {
            config,
            processor: Arc::new(processor),
            sessions: Arc::new(sessions),
            ml_client: Some(client),
        })
    }

    /// State around an already built processor.
    pub fn with_processor(
        config: ApiConfig,
        processor: SessionProcessor,
        sessions: SessionIdPool,
    ) -> Self {
        Self {
            config,
            processor: Arc::new(processor),
            sessions: Arc::new(sessions),
            ml_client: None,
        }
    }
}
