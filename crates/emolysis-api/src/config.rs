//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use emolysis_models::Language;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max uploaded video size in bytes
    pub max_upload_size: usize,
    /// Root of the per-session directories
    pub data_dir: PathBuf,
    /// Language used when the client does not pass `?lang=`
    pub default_language: Language,
    /// How long to wait for the video frame after the socket opens
    pub upload_timeout: Duration,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 16000,
            cors_origins: vec!["*".to_string()],
            max_upload_size: 1024 * 1024 * 1024, // 1GB
            data_dir: PathBuf::from("data"),
            default_language: Language::En,
            upload_timeout: Duration::from_secs(120),
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    ///
    /// Fails only on a `DEFAULT_LANGUAGE` with no analyzer.
    pub fn from_env() -> Result<Self, emolysis_models::UnsupportedLanguageError> {
        let defaults = Self::default();
        let default_language = match std::env::var("DEFAULT_LANGUAGE") {
            Ok(lang) => lang.parse()?,
            Err(_) => defaults.default_language,
        };

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            default_language,
            upload_timeout: std::env::var("UPLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_timeout),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
