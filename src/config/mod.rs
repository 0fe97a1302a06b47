//! Configuration loading and validation.
//!
//! The route table is read once at start-up from a single file; changing
//! it requires a restart. [`load`] picks a parser from the file extension,
//! validates the result, and returns a [`ConfigVersion`] fingerprint that
//! is logged so operators can tell which file a running process loaded.

pub mod model;
pub mod sources;
pub mod validation;

use std::path::Path;

use crate::error::FrontdoorError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// First eight hex digits, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

pub async fn load(path: &Path) -> Result<(Config, ConfigVersion), FrontdoorError> {
    sources::file_source(path)?.load().await
}
