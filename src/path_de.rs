use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::LoadError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, LoadError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(decode_error)
}

pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, LoadError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(decode_error)
}

/// Read a JSON file, optionally narrowing to the node at `json_pointer`
/// (e.g. `/definitions/order`) before decoding.
pub fn load_file<T: DeserializeOwned>(path: &Path, json_pointer: Option<&str>) -> Result<T, LoadError> {
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match json_pointer {
        None => from_str_with_path(&source),
        Some(pointer) => {
            let mut value: serde_json::Value = from_str_with_path(&source)?;
            let selected = value
                .pointer_mut(pointer)
                .map(serde_json::Value::take)
                .ok_or_else(|| LoadError::Pointer { pointer: pointer.to_string() })?;
            from_value_with_path(selected)
        }
    }
}

fn decode_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> LoadError {
    LoadError::Decode {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}
