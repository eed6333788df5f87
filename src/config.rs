//! Configuration module

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory used to resolve relative paths
    pub base_dir: PathBuf,

    /// Optional model override (`MODEL_PATH`), absolute or relative to `base_dir`
    pub model_path: Option<PathBuf>,

    /// Directory scanned for model artifacts
    pub models_dir: PathBuf,

    /// Directory receiving archived uploads
    pub upload_dir: PathBuf,

    /// Server port
    pub port: u16,

    /// Request body limit for uploads, in bytes
    pub max_upload_bytes: usize,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base_dir = env::var("SERVICE_BASE_DIR")
            .map(PathBuf::from)
            .ok()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            model_path: env::var("MODEL_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            models_dir: env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base_dir.join("models")),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base_dir.join("uploads")),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(20 * 1024 * 1024),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            base_dir,
        }
    }

    /// Configuration rooted at `base_dir` with default subdirectories
    #[cfg(test)]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            model_path: None,
            models_dir: base_dir.join("models"),
            upload_dir: base_dir.join("uploads"),
            port: 8000,
            max_upload_bytes: 20 * 1024 * 1024,
            environment: "development".to_string(),
            base_dir,
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
