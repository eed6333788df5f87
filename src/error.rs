//! Error handling

use std::path::PathBuf;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::classifier::InputShape;

pub type AppResult<T> = Result<T, AppError>;

/// Per-request errors returned by the HTTP handlers
#[derive(Debug)]
pub enum AppError {
    // Upload validation errors
    NotAnImage,
    EmptyUpload,
    MissingField(&'static str),
    Multipart(StatusCode, String),

    // Decode / inference / archive errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::NotAnImage => (
                StatusCode::BAD_REQUEST,
                "Please upload an image file (jpg/png).".to_string(),
            ),
            AppError::EmptyUpload => (StatusCode::BAD_REQUEST, "Uploaded file is empty.".to_string()),
            AppError::MissingField(name) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Missing form field '{}'", name),
            ),
            AppError::Multipart(status, msg) => {
                if status.is_server_error() {
                    tracing::error!("Multipart error: {}", msg);
                }
                (*status, format!("Malformed multipart body: {}", msg))
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "detail": detail,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Keeps axum's status, e.g. 413 when the body limit is hit.
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Multipart(err.status(), err.body_text())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::InternalError(format!("Image decode failed: {}", err))
    }
}

impl From<crate::classifier::InferenceError> for AppError {
    fn from(err: crate::classifier::InferenceError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

/// Startup errors. Any of these stops the process before it serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("No model found. Set MODEL_PATH or put a .safetensors/.onnx file in {}", .models_dir.display())]
    NotFound { models_dir: PathBuf },

    #[error("Failed to load model at {}: {}", .path.display(), .reason)]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Failed to load weights-only model via fallback (input_shape={input_shape}): {reason}")]
    FallbackFailed { input_shape: InputShape, reason: String },
}
