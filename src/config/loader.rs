//! Build file loading.

use crate::config::schema::BuildConfig;
use crate::error::{BakeryError, Result};
use std::fs;
use std::path::Path;

/// Load and parse a build file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<BuildConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BakeryError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            BakeryError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into a [`BuildConfig`].
///
/// `source_path` is only used for error reporting.
pub fn parse_config(content: &str, source_path: &Path) -> Result<BuildConfig> {
    serde_yaml::from_str(content).map_err(|e| BakeryError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}
