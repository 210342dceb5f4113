//! JSON structure helpers for applying config and setting decisions.

use serde_json::Value;

/// Recursively merge `patch` into `base`. Objects merge key-wise; any other
/// value in `patch` replaces the corresponding value in `base`. Keys absent
/// from `patch` survive untouched.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => {
            *base = patch.clone();
        }
    }
}

/// Set the value at a dot-separated path, creating intermediate objects as
/// needed. Fails when a path segment runs into a non-object value.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(format!("empty segment in path {path:?}"));
        }

        let map = match current {
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "cannot descend into {} at segment {segment:?} of {path:?}",
                    type_name(other)
                ));
            }
        };

        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return Ok(());
        }

        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    unreachable!("split always yields at least one segment")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
