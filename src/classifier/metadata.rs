//! Architecture metadata embedded in weights-only artifacts
//!
//! The exporter stores the original architecture description as JSON under
//! the `model_config` key of the safetensors `__metadata__` header. Only the
//! input shape is recovered from it.

use safetensors::SafeTensors;
use serde_json::Value;

use super::InputShape;
use crate::constants::MODEL_CONFIG_KEY;

/// Read the input shape out of a safetensors buffer's `model_config`.
/// Any failure (bad header, no metadata, bad JSON, no usable shape) → `None`.
pub fn extract_input_shape(buffer: &[u8]) -> Option<InputShape> {
    let (_, metadata) = SafeTensors::read_metadata(buffer).ok()?;
    let raw = metadata.metadata().as_ref()?.get(MODEL_CONFIG_KEY)?;
    let config: Value = serde_json::from_str(raw).ok()?;

    let batch = find_batch_shape(&config)?;
    shape_from_batch(batch)
}

/// Depth-first search for the first truthy `batch_shape`.
///
/// An object carrying a null or empty `batch_shape` ends the search in that
/// object; siblings are still searched.
fn find_batch_shape(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get("batch_shape") {
                return is_truthy(found).then_some(found);
            }
            map.values().find_map(find_batch_shape)
        }
        Value::Array(items) => items.iter().find_map(find_batch_shape),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `[batch, height, width, channels]` → shape; needs entries 1..=3 to be
/// positive integers (or integral numbers / numeric strings).
fn shape_from_batch(batch: &Value) -> Option<InputShape> {
    let dims = batch.as_array()?;
    if dims.len() < 4 {
        return None;
    }

    let dim = |v: &Value| -> Option<usize> {
        let n = match v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.trunc() as u64))?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        usize::try_from(n).ok().filter(|d| *d > 0)
    };

    Some(InputShape::new(dim(&dims[1])?, dim(&dims[2])?, dim(&dims[3])?))
}
