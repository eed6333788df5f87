//! Model Locator - picks the model artifact at startup

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_MODEL_FILES, FULL_MODEL_EXTENSION, LEGACY_WEIGHTS_EXTENSION};
use crate::error::ModelError;

/// Resolve the model file to load.
///
/// An override (relative paths resolved against `base_dir`) is the only
/// candidate when given. Otherwise: the default model files, every
/// `*.safetensors` in `models_dir`, then every `*.onnx` in `models_dir`.
/// The first candidate that exists wins and is returned canonicalized.
pub fn resolve_model_path(
    override_path: Option<&Path>,
    base_dir: &Path,
    models_dir: &Path,
) -> Result<PathBuf, ModelError> {
    let mut candidates = Vec::new();

    if let Some(path) = override_path {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        if !resolved.is_file() {
            tracing::error!("MODEL_PATH {} does not exist", resolved.display());
        }
        candidates.push(resolved);
    } else {
        candidates.extend(DEFAULT_MODEL_FILES.iter().map(|name| models_dir.join(name)));
        candidates.extend(scan_dir(models_dir, LEGACY_WEIGHTS_EXTENSION));
        candidates.extend(scan_dir(models_dir, FULL_MODEL_EXTENSION));
    }

    let mut seen = HashSet::new();
    for path in candidates {
        let path = fs::canonicalize(&path).unwrap_or(path);
        if !seen.insert(path.clone()) {
            continue;
        }
        if path.is_file() {
            return Ok(path);
        }
    }

    Err(ModelError::NotFound { models_dir: models_dir.to_path_buf() })
}

/// Files in `dir` with the given extension, sorted. Missing dir → empty.
fn scan_dir(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .collect();
    found.sort();
    found
}
