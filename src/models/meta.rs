//! Model metadata served by `/info` and `/health`

use serde::{Deserialize, Serialize};

use crate::classifier::ModelArtifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub model_path: String,
    pub model_name: String,
    pub input_size: InputSize,
    pub class_labels: Vec<String>,
}

impl From<&ModelArtifact> for ModelMeta {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            model_path: artifact.path.display().to_string(),
            model_name: artifact.file_name(),
            input_size: InputSize {
                width: artifact.input_shape.width,
                height: artifact.input_shape.height,
            },
            class_labels: artifact.class_labels.clone(),
        }
    }
}
