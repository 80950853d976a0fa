//! Document loading.
//!
//! A document is structured text (JSON or YAML, dispatched on file
//! extension) whose top level must be a mapping. The file handle is held
//! only for the duration of the read.

use std::path::Path;

use serde_json::Value;

use crate::dirs::Directories;
use crate::error::ConflateError;

/// Load the document behind `locator`, expanding `$NAME$` placeholders
/// against `dirs` first.
pub fn load_document(locator: &str, dirs: &Directories) -> Result<Value, ConflateError> {
    let path_str = dirs.expand(locator)?;
    let path = Path::new(&path_str);

    let data = std::fs::read_to_string(path).map_err(|e| ConflateError::NotFound {
        locator: path_str.clone(),
        source: e,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let doc: Value = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&data).map_err(|e| ConflateError::Malformed {
            locator: path_str.clone(),
            message: e.to_string(),
        })?,
        _ => serde_json::from_str(&data).map_err(|e| ConflateError::Malformed {
            locator: path_str.clone(),
            message: e.to_string(),
        })?,
    };

    if !doc.is_object() {
        return Err(ConflateError::Malformed {
            locator: path_str,
            message: "top level must be a mapping".into(),
        });
    }

    Ok(doc)
}
