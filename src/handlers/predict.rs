//! Prediction handler

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};

use crate::classifier::preprocess::preprocess_image;
use crate::models::PredictionResult;
use crate::{AppError, AppResult, AppState};

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

/// Classify an uploaded leaf image
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<PredictionResult>> {
    let upload = read_upload(&mut multipart).await?;

    if upload.bytes.is_empty() {
        return Err(AppError::EmptyUpload);
    }

    let saved_filename = state
        .archive
        .save(&upload.bytes, upload.file_name.as_deref())
        .await?;

    let model = state.model.clone();
    let bytes = upload.bytes;
    let scores = tokio::task::spawn_blocking(move || -> AppResult<Vec<f32>> {
        let batch = preprocess_image(&bytes, model.artifact.input_shape)?;
        Ok(model.classifier.predict(batch)?)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Inference task failed: {}", e)))??;

    let result = PredictionResult::from_scores(
        &scores,
        &state.model.artifact.class_labels,
        saved_filename,
    );

    tracing::info!(
        "Predicted {} ({:.3}) for {}",
        result.top_label,
        result.confidence,
        result.saved_filename
    );

    Ok(Json(result))
}

/// Find the `file` field and check its media type before reading the body.
async fn read_upload(multipart: &mut Multipart) -> AppResult<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(AppError::NotAnImage);
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        return Ok(Upload { file_name, bytes });
    }

    Err(AppError::MissingField(FILE_FIELD))
}
