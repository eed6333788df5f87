//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::models::ModelMeta;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model: ModelMeta,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.meta.as_ref().clone(),
    })
}
