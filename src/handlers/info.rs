//! Informational handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::constants::ROOT_MESSAGE;
use crate::models::ModelMeta;
use crate::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse { message: ROOT_MESSAGE })
}

/// Metadata of the loaded model
pub async fn info(State(state): State<AppState>) -> Json<ModelMeta> {
    Json(state.meta.as_ref().clone())
}
