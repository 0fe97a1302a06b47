//! File-based config sources.
//!
//! Provides one [`FileSource`](file_source::FileSource) constructor per
//! format (YAML, JSON, TOML) gated by feature flags, [`file_source`] to
//! pick one from a path, and the [`parse_config_str`] helper used by
//! `frontdoor validate`.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::FrontdoorError;
use file_source::FileSource;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, FrontdoorError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| FrontdoorError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| FrontdoorError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| FrontdoorError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(FrontdoorError::UnsupportedFormat(other.to_string())),
    }
}

/// Pick the [`FileSource`] matching the file extension.
pub fn file_source(path: &Path) -> Result<FileSource, FrontdoorError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(yaml::new(path.to_path_buf())),

        #[cfg(feature = "json")]
        "json" => Ok(json::new(path.to_path_buf())),

        #[cfg(feature = "toml")]
        "toml" => Ok(toml_source::new(path.to_path_buf())),

        other => Err(FrontdoorError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
