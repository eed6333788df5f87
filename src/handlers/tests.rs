use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use image::{ImageBuffer, ImageFormat, Rgb};
use ndarray::Array4;
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use crate::archive::UploadArchive;
use crate::classifier::{InferenceError, InputShape, LoadStage, LoadedModel, ModelArtifact, Classifier};
use crate::config::Config;
use crate::constants::CLASS_LABELS;
use crate::{create_router, AppState};

const BOUNDARY: &str = "leafboundary";

/// Softmax-like output that ignores its input
struct StubClassifier;

impl Classifier for StubClassifier {
    fn declared_input_shape(&self) -> Option<InputShape> {
        Some(InputShape::new(32, 32, 3))
    }

    fn predict(&self, batch: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        assert_eq!(batch.dim(), (1, 32, 32, 3));
        Ok(vec![0.1, 0.65, 0.2, 0.05])
    }

    fn backend(&self) -> &'static str {
        "stub"
    }
}

fn app() -> (Router, TempDir) {
    app_with_limit(20 * 1024 * 1024)
}

fn app_with_limit(max_upload_bytes: usize) -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let mut config = Config::with_base_dir(dir.path());
    config.max_upload_bytes = max_upload_bytes;

    let model = LoadedModel {
        classifier: Arc::new(StubClassifier),
        artifact: ModelArtifact {
            path: config.models_dir.join("leaf.onnx"),
            input_shape: InputShape::new(32, 32, 3),
            class_labels: CLASS_LABELS.iter().map(|l| l.to_string()).collect(),
        },
        stage: LoadStage::Primary,
    };
    let archive = UploadArchive::open(&config.upload_dir).unwrap();

    (create_router(AppState::new(model, archive, config)), dir)
}

fn upload_count(dir: &TempDir) -> usize {
    fs::read_dir(dir.path().join("uploads")).unwrap().count()
}

fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(12, 9, Rgb([30u8, 160, 40]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn multipart_request(filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = part_head("file", filename, content_type);
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    post_predict(body)
}

/// Opening boundary and headers of one form part
fn part_head(field: &str, filename: &str, content_type: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        BOUNDARY, field, filename, content_type
    )
    .into_bytes()
}

fn post_predict(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_predict_returns_full_distribution() {
    let (app, dir) = app();

    let (status, body) = send(&app, multipart_request("daun.png", "image/png", &png_bytes())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["top_label"], "Hawar");
    assert!((body["confidence"].as_f64().unwrap() - 0.65).abs() < 1e-6);

    let probs = body["probabilities"].as_array().unwrap();
    assert_eq!(probs.len(), CLASS_LABELS.len());
    let labels: Vec<&str> = probs.iter().map(|p| p["label"].as_str().unwrap()).collect();
    assert_eq!(labels, CLASS_LABELS);
    let sum: f64 = probs.iter().map(|p| p["prob"].as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-5);

    let saved = body["saved_filename"].as_str().unwrap();
    assert!(saved.ends_with("_daun.png"));
    assert!(dir.path().join("uploads").join(saved).is_file());
}

#[tokio::test]
async fn test_identical_uploads_archived_separately() {
    let (app, dir) = app();
    let png = png_bytes();

    let (_, first) = send(&app, multipart_request("a/b.png", "image/png", &png)).await;
    let (_, second) = send(&app, multipart_request("a/b.png", "image/png", &png)).await;

    assert_ne!(first["saved_filename"], second["saved_filename"]);
    assert!(first["saved_filename"].as_str().unwrap().ends_with("_a_b.png"));
    assert_eq!(upload_count(&dir), 2);
}

#[tokio::test]
async fn test_non_image_rejected_without_archiving() {
    let (app, dir) = app();

    let (status, body) = send(&app, multipart_request("notes.txt", "text/plain", b"hello")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("image"));
    assert_eq!(upload_count(&dir), 0);
}

#[tokio::test]
async fn test_empty_upload_rejected_without_archiving() {
    let (app, dir) = app();

    let (status, body) = send(&app, multipart_request("empty.png", "image/png", b"")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(upload_count(&dir), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let (app, dir) = app_with_limit(1024);
    let big = vec![0x42u8; 8 * 1024];

    let (status, body) = send(&app, multipart_request("big.png", "image/png", &big)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], 413);
    assert_eq!(upload_count(&dir), 0);
}

#[tokio::test]
async fn test_missing_file_field_is_unprocessable() {
    let (app, dir) = app();

    let mut body = part_head("image", "daun.png", "image/png");
    body.extend_from_slice(&png_bytes());
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    let (status, body) = send(&app, post_predict(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("'file'"));
    assert_eq!(upload_count(&dir), 0);
}

#[tokio::test]
async fn test_truncated_multipart_is_bad_request() {
    let (app, dir) = app();

    // No closing boundary after the part data.
    let mut body = part_head("file", "daun.png", "image/png");
    body.extend_from_slice(&png_bytes());
    let (status, body) = send(&app, post_predict(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Malformed multipart body"));
    assert_eq!(upload_count(&dir), 0);
}

#[tokio::test]
async fn test_undecodable_image_is_server_error() {
    let (app, dir) = app();

    let (status, _) = send(&app, multipart_request("fake.jpg", "image/jpeg", b"not really a jpeg")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Archived before decoding.
    assert_eq!(upload_count(&dir), 1);
}

#[tokio::test]
async fn test_info_matches_health_model() {
    let (app, _dir) = app();

    let (status, info) = send(&app, get("/info")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, health) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], info);
    assert_eq!(info["model_name"], "leaf.onnx");
    assert_eq!(info["input_size"]["width"], 32);
    assert_eq!(info["class_labels"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_root_message() {
    let (app, _dir) = app();
    let (status, body) = send(&app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("/predict"));
}
