//! ONNX Runtime backend for full serialized models

use std::path::Path;

use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Value, ValueType};
use parking_lot::Mutex;

use super::loader::RuntimeError;
use super::{Classifier, InferenceError, InputShape};

/// Full model loaded into an ONNX Runtime session
pub struct OnnxClassifier {
    // `Session::run` needs `&mut`, so calls are serialized.
    session: Mutex<Session>,
    input_shape: Option<InputShape>,
    output_name: String,
}

impl OnnxClassifier {
    /// Load an ONNX model from file
    pub fn load(model_path: &Path) -> Result<Self, RuntimeError> {
        tracing::info!("Loading ONNX model from: {}", model_path.display());

        if let Err(e) = std::fs::metadata(model_path) {
            return Err(RuntimeError::Other(format!("Cannot read {}: {}", model_path.display(), e)));
        }

        let session = Session::builder()
            .map_err(|e| RuntimeError::Other(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RuntimeError::Other(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| RuntimeError::InvalidArtifact(format!("Failed to load model: {}", e)))?;

        let input_shape = session.inputs.first().and_then(|input| match &input.input_type {
            ValueType::Tensor { shape, .. } => InputShape::from_batch_dims(shape),
            _ => None,
        });

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| RuntimeError::InvalidArtifact("No output defined".to_string()))?;

        tracing::info!("ONNX model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            input_shape,
            output_name,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn declared_input_shape(&self) -> Option<InputShape> {
        self.input_shape
    }

    fn predict(&self, batch: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let input_tensor = Value::from_array(batch)
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        Ok(data.to_vec())
    }

    fn backend(&self) -> &'static str {
        "onnx"
    }
}
