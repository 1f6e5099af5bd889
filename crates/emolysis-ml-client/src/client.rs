//! Inference service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use emolysis_media::{AudioClip, Frame, Transcript};
use emolysis_models::Language;

use crate::error::{MlError, MlResult};
use crate::types::{
    AudioEmotionRequest, AudioEmotionResponse, FaceDetectResponse, FaceEmotionResponse,
    HealthResponse, ImagePayload, ImageRequest, TextEmotionRequest, TextEmotionResponse,
    TranscribeRequest,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(600), // transcription of long videos
            max_retries: 2,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Client for the emotion inference service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the inference service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Inference service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference service health check error: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn transcribe(&self, video_path: &Path, language: Language) -> MlResult<Transcript> {
        let absolute = tokio::fs::canonicalize(video_path).await?;
        let request = TranscribeRequest {
            video_path: absolute.to_string_lossy().into_owned(),
            language,
        };
        self.post_json("/transcribe", &request).await
    }

    pub async fn audio_emotion(&self, clip: &AudioClip) -> MlResult<AudioEmotionResponse> {
        let request = AudioEmotionRequest::from_samples(&clip.samples, clip.sample_rate);
        self.post_json("/audio/emotion", &request).await
    }

    pub async fn text_emotion(&self, text: &str, language: Language) -> MlResult<TextEmotionResponse> {
        let request = TextEmotionRequest {
            text: text.to_string(),
            language,
        };
        self.post_json("/text/emotion", &request).await
    }

    pub async fn detect_faces(&self, frame: &Frame) -> MlResult<FaceDetectResponse> {
        let request = ImageRequest {
            image: ImagePayload::from_frame(frame),
        };
        self.post_json("/faces/detect", &request).await
    }

    pub async fn face_emotion(&self, face: &Frame) -> MlResult<FaceEmotionResponse> {
        let request = ImageRequest {
            image: ImagePayload::from_frame(face),
        };
        self.post_json("/faces/emotion", &request).await
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending inference request to {}", url);

        let url = url.as_str();
        let response = self
            .with_retry(|| async move {
                let response = self
                    .http
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(MlError::Network)?;
                if response.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Err(MlError::ServiceUnavailable(format!("{} returned 503", path)));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Inference request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.max_retries, 2);
    }
}
