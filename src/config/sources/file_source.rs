//! Generic async file-based config source with SHA256 fingerprinting.
//!
//! [`FileSource`] works for any file format by accepting a
//! deserialization function at construction time. It reads the file
//! asynchronously via Tokio, validates the result, and computes a SHA256
//! hash that identifies the loaded revision.

use std::path::{Path, PathBuf};

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::FrontdoorError;

pub type Deserializer = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserializer,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserializer) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String, FrontdoorError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FrontdoorError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                FrontdoorError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<(Config, ConfigVersion), FrontdoorError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|e| FrontdoorError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if let Err(errors) = validate(&config) {
            return Err(FrontdoorError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
