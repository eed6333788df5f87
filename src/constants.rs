//! Central Configuration Constants
//!
//! Single source of truth for model-related defaults.

/// Class labels, in the order used when the model was trained.
pub const CLASS_LABELS: [&str; 4] = ["Bercak", "Hawar", "Karat", "Sehat"];

/// Default model files checked before scanning the models directory
pub const DEFAULT_MODEL_FILES: [&str; 2] = [
    "Model_CNN_256px.onnx",    // full model exported from the first CNN
    "final_model.safetensors", // weights-only export from the notebook
];

/// Extension of weights-only artifacts (scanned first)
pub const LEGACY_WEIGHTS_EXTENSION: &str = "safetensors";

/// Extension of full serialized models (scanned second)
pub const FULL_MODEL_EXTENSION: &str = "onnx";

/// Metadata key holding the architecture description in weights-only artifacts
pub const MODEL_CONFIG_KEY: &str = "model_config";

/// Input shape used whenever the model does not declare one
pub const DEFAULT_INPUT_HEIGHT: usize = 256;
pub const DEFAULT_INPUT_WIDTH: usize = 256;
pub const DEFAULT_INPUT_CHANNELS: usize = 3;

/// Units in the hidden dense layer of the classification head
pub const HEAD_HIDDEN_UNITS: usize = 256;

/// Fallback name for uploads without a filename
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Message served at `GET /`
pub const ROOT_MESSAGE: &str =
    "Backend ready. Use POST /predict to classify an image, /health to check status.";
