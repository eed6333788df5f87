//! Corn Leaf Disease Detector - Inference Server
//!
//! Classifies uploaded leaf photos with a pretrained CNN.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 CORNLEAF SERVER                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  startup:  Locator ──▶ Loader ──▶ AppState (shared)      │
//! │                          │                               │
//! │                 ┌────────┴─────────┐                     │
//! │                 ▼                  ▼                     │
//! │           ONNX Runtime      DenseNet-121 (candle)        │
//! │           (.onnx)           (.safetensors weights)       │
//! │                                                          │
//! │  request:  POST /predict ──▶ archive ──▶ preprocess      │
//! │                         ──▶ classify ──▶ JSON            │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod archive;
mod classifier;
mod config;
mod constants;
mod error;
mod handlers;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::archive::UploadArchive;
use crate::classifier::{LoadStage, LoadedModel, NativeRuntime};
use crate::constants::CLASS_LABELS;
use crate::models::ModelMeta;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cornleaf_server=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Cornleaf server starting ({})...", config.environment);

    if let Err(e) = run(config).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(config: config::Config) -> anyhow::Result<()> {
    // Pick and load the model once
    let model_path = classifier::resolve_model_path(
        config.model_path.as_deref(),
        &config.base_dir,
        &config.models_dir,
    )?;
    tracing::info!("Model: {}", model_path.display());

    let model = tokio::task::spawn_blocking(move || {
        classifier::load_model(&NativeRuntime, &model_path, &CLASS_LABELS)
    })
    .await??;

    match model.stage {
        LoadStage::Primary => tracing::info!("Model loaded ({})", model.classifier.backend()),
        LoadStage::Fallback { input_shape } => tracing::info!(
            "Model loaded via weights-only fallback ({}, input_shape={})",
            model.classifier.backend(),
            input_shape
        ),
    }
    tracing::info!("Input size: {}", model.artifact.input_shape);

    let archive = UploadArchive::open(&config.upload_dir)?;
    tracing::info!("Uploads archived to {}", archive.dir().display());

    // Build application state
    let state = AppState::new(model, archive, config.clone());

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<LoadedModel>,
    pub meta: Arc<ModelMeta>,
    pub archive: Arc<UploadArchive>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(model: LoadedModel, archive: UploadArchive, config: config::Config) -> Self {
        Self {
            meta: Arc::new(ModelMeta::from(&model.artifact)),
            model: Arc::new(model),
            archive: Arc::new(archive),
            config,
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let predict_routes = Router::new()
        .route("/predict", post(handlers::predict::predict))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .route("/", get(handlers::info::root))
        .route("/health", get(handlers::health::check))
        .route("/info", get(handlers::info::info))
        .merge(predict_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
