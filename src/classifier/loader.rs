//! Model Loader - two-stage model loading
//!
//! Stage 1 deserializes the artifact as a full model. If that fails because
//! the content is not a full model and the file is a weights-only artifact,
//! stage 2 rebuilds the reference network and loads just the weights.

use std::path::Path;
use std::sync::Arc;

use super::densenet::DenseNetClassifier;
use super::metadata::extract_input_shape;
use super::onnx::OnnxClassifier;
use super::{Classifier, InputShape, ModelArtifact};
use crate::constants::LEGACY_WEIGHTS_EXTENSION;
use crate::error::ModelError;

/// Stage 1 failure, classified so the loader can decide whether to fall back
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The file was read but its content failed validation as a full model
    #[error("{0}")]
    InvalidArtifact(String),

    /// Anything else (I/O, runtime setup)
    #[error("{0}")]
    Other(String),
}

/// Deep-learning runtime seam
pub trait ModelRuntime {
    /// Stage 1: deserialize a full model (graph + weights)
    fn load_full(&self, path: &Path) -> Result<Box<dyn Classifier>, RuntimeError>;

    /// Input shape recorded in the artifact's embedded architecture config
    fn embedded_input_shape(&self, path: &Path) -> Option<InputShape>;

    /// Stage 2: rebuild the reference network and load only its weights
    fn load_weights(
        &self,
        path: &Path,
        input_shape: InputShape,
        num_classes: usize,
    ) -> anyhow::Result<Box<dyn Classifier>>;
}

/// ONNX Runtime for full models, candle for the rebuilt reference network
pub struct NativeRuntime;

impl ModelRuntime for NativeRuntime {
    fn load_full(&self, path: &Path) -> Result<Box<dyn Classifier>, RuntimeError> {
        Ok(Box::new(OnnxClassifier::load(path)?))
    }

    fn embedded_input_shape(&self, path: &Path) -> Option<InputShape> {
        let buffer = std::fs::read(path).ok()?;
        extract_input_shape(&buffer)
    }

    fn load_weights(
        &self,
        path: &Path,
        input_shape: InputShape,
        num_classes: usize,
    ) -> anyhow::Result<Box<dyn Classifier>> {
        let buffer = std::fs::read(path)?;
        let model = DenseNetClassifier::from_safetensors(buffer, input_shape, num_classes)?;
        Ok(Box::new(model))
    }
}

/// Which stage produced the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Primary,
    Fallback { input_shape: InputShape },
}

/// What to do after stage 1 fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    RebuildFromWeights,
    Fatal,
}

/// Fall back only for invalid content in a weights-only artifact.
pub fn decide_fallback(path: &Path, error: &RuntimeError) -> FallbackDecision {
    let is_legacy = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(LEGACY_WEIGHTS_EXTENSION));

    match error {
        RuntimeError::InvalidArtifact(_) if is_legacy => FallbackDecision::RebuildFromWeights,
        _ => FallbackDecision::Fatal,
    }
}

/// The process-wide model, shared read-only by all requests
#[derive(Clone)]
pub struct LoadedModel {
    pub classifier: Arc<dyn Classifier>,
    pub artifact: ModelArtifact,
    pub stage: LoadStage,
}

/// Load the artifact at `path`, falling back to the reference network when
/// allowed. Called once at startup.
pub fn load_model(
    runtime: &dyn ModelRuntime,
    path: &Path,
    class_labels: &[&str],
) -> Result<LoadedModel, ModelError> {
    let (classifier, stage) = match runtime.load_full(path) {
        Ok(classifier) => (classifier, LoadStage::Primary),
        Err(err) => match decide_fallback(path, &err) {
            FallbackDecision::RebuildFromWeights => {
                tracing::warn!(
                    "Full model load failed ({}); trying weights-only fallback for .{}",
                    err,
                    LEGACY_WEIGHTS_EXTENSION
                );
                let input_shape = runtime.embedded_input_shape(path).unwrap_or_else(|| {
                    tracing::warn!(
                        "No input shape in model_config, assuming {}",
                        InputShape::default()
                    );
                    InputShape::default()
                });
                let classifier = runtime
                    .load_weights(path, input_shape, class_labels.len())
                    .map_err(|e| ModelError::FallbackFailed {
                        input_shape,
                        reason: format!("{:#}", e),
                    })?;
                (classifier, LoadStage::Fallback { input_shape })
            }
            FallbackDecision::Fatal => {
                return Err(ModelError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        },
    };

    let input_shape = classifier.declared_input_shape().unwrap_or_else(|| {
        tracing::warn!(
            "Model declares no static input shape, assuming {}",
            InputShape::default()
        );
        InputShape::default()
    });

    Ok(LoadedModel {
        classifier: Arc::from(classifier),
        artifact: ModelArtifact {
            path: path.to_path_buf(),
            input_shape,
            class_labels: class_labels.iter().map(|l| l.to_string()).collect(),
        },
        stage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::InferenceError;
    use ndarray::Array4;
    use parking_lot::Mutex;

    struct FixedClassifier(Option<InputShape>);

    impl Classifier for FixedClassifier {
        fn declared_input_shape(&self) -> Option<InputShape> {
            self.0
        }
        fn predict(&self, _batch: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.25; 4])
        }
        fn backend(&self) -> &'static str {
            "fixed"
        }
    }

    enum Primary {
        Ok(Option<InputShape>),
        Invalid,
        Io,
    }

    struct MockRuntime {
        primary: Primary,
        embedded: Option<InputShape>,
        weights_ok: bool,
        weights_calls: Mutex<Vec<(InputShape, usize)>>,
    }

    impl MockRuntime {
        fn new(primary: Primary) -> Self {
            Self { primary, embedded: None, weights_ok: true, weights_calls: Mutex::new(Vec::new()) }
        }
    }

    impl ModelRuntime for MockRuntime {
        fn load_full(&self, _path: &Path) -> Result<Box<dyn Classifier>, RuntimeError> {
            match self.primary {
                Primary::Ok(shape) => Ok(Box::new(FixedClassifier(shape))),
                Primary::Invalid => Err(RuntimeError::InvalidArtifact("bad protobuf".into())),
                Primary::Io => Err(RuntimeError::Other("permission denied".into())),
            }
        }

        fn embedded_input_shape(&self, _path: &Path) -> Option<InputShape> {
            self.embedded
        }

        fn load_weights(
            &self,
            _path: &Path,
            input_shape: InputShape,
            num_classes: usize,
        ) -> anyhow::Result<Box<dyn Classifier>> {
            self.weights_calls.lock().push((input_shape, num_classes));
            if self.weights_ok {
                Ok(Box::new(FixedClassifier(Some(input_shape))))
            } else {
                anyhow::bail!("shape mismatch for head.dense.weight")
            }
        }
    }

    const LABELS: [&str; 4] = ["a", "b", "c", "d"];

    #[test]
    fn test_primary_success_uses_declared_shape() {
        let runtime = MockRuntime::new(Primary::Ok(Some(InputShape::new(224, 224, 3))));
        let model = load_model(&runtime, Path::new("m.onnx"), &LABELS).unwrap();

        assert_eq!(model.stage, LoadStage::Primary);
        assert_eq!(model.artifact.input_shape, InputShape::new(224, 224, 3));
        assert_eq!(model.artifact.class_labels.len(), 4);
        assert!(runtime.weights_calls.lock().is_empty());
    }

    #[test]
    fn test_primary_without_shape_defaults() {
        let runtime = MockRuntime::new(Primary::Ok(None));
        let model = load_model(&runtime, Path::new("m.onnx"), &LABELS).unwrap();
        assert_eq!(model.artifact.input_shape, InputShape::default());
    }

    #[test]
    fn test_invalid_weights_artifact_falls_back() {
        let mut runtime = MockRuntime::new(Primary::Invalid);
        runtime.embedded = Some(InputShape::new(192, 192, 3));

        let model = load_model(&runtime, Path::new("final_model.SafeTensors"), &LABELS).unwrap();

        assert_eq!(model.stage, LoadStage::Fallback { input_shape: InputShape::new(192, 192, 3) });
        assert_eq!(model.artifact.input_shape, InputShape::new(192, 192, 3));
        assert_eq!(*runtime.weights_calls.lock(), vec![(InputShape::new(192, 192, 3), 4)]);
    }

    #[test]
    fn test_fallback_without_embedded_shape_uses_default() {
        let runtime = MockRuntime::new(Primary::Invalid);
        let model = load_model(&runtime, Path::new("w.safetensors"), &LABELS).unwrap();
        assert_eq!(model.stage, LoadStage::Fallback { input_shape: InputShape::default() });
    }

    #[test]
    fn test_invalid_full_model_is_fatal() {
        let runtime = MockRuntime::new(Primary::Invalid);
        let err = load_model(&runtime, Path::new("/models/m.onnx"), &LABELS).err().unwrap();

        assert!(matches!(err, ModelError::LoadFailed { .. }));
        assert!(err.to_string().contains("/models/m.onnx"));
        assert!(runtime.weights_calls.lock().is_empty());
    }

    #[test]
    fn test_io_error_on_weights_artifact_is_fatal() {
        let runtime = MockRuntime::new(Primary::Io);
        let err = load_model(&runtime, Path::new("w.safetensors"), &LABELS).err().unwrap();
        assert!(matches!(err, ModelError::LoadFailed { .. }));
    }

    #[test]
    fn test_failed_fallback_names_input_shape() {
        let mut runtime = MockRuntime::new(Primary::Invalid);
        runtime.weights_ok = false;

        let err = load_model(&runtime, Path::new("w.safetensors"), &LABELS).err().unwrap();

        assert!(matches!(err, ModelError::FallbackFailed { .. }));
        let msg = err.to_string();
        assert!(msg.contains("(256, 256, 3)"));
        assert!(msg.contains("head.dense.weight"));
    }

    #[test]
    fn test_native_runtime_reads_embedded_shape_and_rejects_empty_weights() {
        use crate::classifier::metadata::tests::header_only;
        use crate::constants::MODEL_CONFIG_KEY;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_model.safetensors");
        let config = r#"{"config":{"layers":[{"config":{"batch_shape":[null,64,64,3]}}]}}"#;
        std::fs::write(&path, header_only(Some((MODEL_CONFIG_KEY, config)))).unwrap();

        let runtime = NativeRuntime;
        assert_eq!(runtime.embedded_input_shape(&path), Some(InputShape::new(64, 64, 3)));

        // Header only: the rebuilt network finds no tensors to bind.
        assert!(runtime.load_weights(&path, InputShape::new(64, 64, 3), 4).is_err());
    }
}
