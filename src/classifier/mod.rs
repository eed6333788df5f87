//! Classifier Module - model discovery, loading and inference
//!
//! Startup runs `locator` once to pick an artifact, then `loader` once to
//! turn it into a shared [`Classifier`]. Requests only go through
//! `preprocess` and [`Classifier::predict`].

pub mod densenet;
pub mod loader;
pub mod locator;
pub mod metadata;
pub mod onnx;
pub mod preprocess;

use std::fmt;
use std::path::PathBuf;

use ndarray::Array4;

use crate::constants::{DEFAULT_INPUT_CHANNELS, DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH};

// Re-export common types
pub use loader::{load_model, LoadStage, LoadedModel, NativeRuntime};
pub use locator::resolve_model_path;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Input tensor shape of a single example (NHWC without the batch axis)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self { height, width, channels }
    }

    /// Build from a Keras-style batch shape `[batch, height, width, channels]`.
    /// Dynamic (non-positive) dimensions yield `None`.
    pub fn from_batch_dims(dims: &[i64]) -> Option<Self> {
        if dims.len() < 4 {
            return None;
        }
        let dim = |v: i64| usize::try_from(v).ok().filter(|d| *d > 0);
        Some(Self::new(dim(dims[1])?, dim(dims[2])?, dim(dims[3])?))
    }
}

impl Default for InputShape {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH, DEFAULT_INPUT_CHANNELS)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

/// Resolved model file plus the metadata inferred from it
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub input_shape: InputShape,
    pub class_labels: Vec<String>,
}

impl ModelArtifact {
    /// File name shown to clients
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("InferenceError: {0}")]
pub struct InferenceError(pub String);

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// A loaded model: maps a `[1, height, width, channels]` batch in `[0, 1]`
/// to one probability per class.
pub trait Classifier: Send + Sync {
    /// Input shape declared by the model itself, if any
    fn declared_input_shape(&self) -> Option<InputShape>;

    /// Run a single-example batch and return its probability vector
    fn predict(&self, batch: Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_dims_to_shape() {
        assert_eq!(
            InputShape::from_batch_dims(&[-1, 224, 192, 3]),
            Some(InputShape::new(224, 192, 3))
        );
        assert_eq!(InputShape::from_batch_dims(&[1, -1, -1, 3]), None);
        assert_eq!(InputShape::from_batch_dims(&[1, 224, 224]), None);
    }

    #[test]
    fn test_default_shape_display() {
        assert_eq!(InputShape::default().to_string(), "(256, 256, 3)");
    }
}
