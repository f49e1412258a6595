//! Pretty JSON output.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{OutputError, Result};

/// Serialize `tree` as indented JSON with a trailing newline.
pub fn to_json_string(tree: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(tree)?;
    text.push('\n');
    Ok(text)
}

pub fn write_json(path: &Path, tree: &Value) -> Result<()> {
    let text = to_json_string(tree)?;
    fs::write(path, text).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
