//! Configuration for upload staging.
//!
//! [`StagingConfig`] decides where staged artifacts land and how much of an
//! upload the pipeline is willing to read. It is cheap to clone and
//! deserializes from JSON, TOML, or YAML.
//!
//! ```rust
//! use ingest::StagingConfig;
//!
//! let config = StagingConfig::default();
//! config.validate().expect("default staging config is valid");
//! assert_eq!(config.file_prefix, "ingest");
//! assert!(config.max_upload_bytes.is_none());
//! ```
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on bytes buffered for a single `meta` candidate.
pub const DEFAULT_MAX_META_BYTES: usize = 64 * 1024;

/// Runtime configuration for [`IngestFileStager`](crate::IngestFileStager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory that receives staged artifacts. Must already exist.
    pub temp_dir: PathBuf,

    /// File-name prefix for staged artifacts; a random suffix is appended.
    pub file_prefix: String,

    /// Upper bound on bytes read from a single upload. `None` disables it.
    pub max_upload_bytes: Option<u64>,

    /// Upper bound on bytes buffered while decoding one `meta` candidate.
    pub max_meta_bytes: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            file_prefix: "ingest".to_string(),
            max_upload_bytes: None,
            max_meta_bytes: DEFAULT_MAX_META_BYTES,
        }
    }
}

impl StagingConfig {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    /// Check invariants that would otherwise fail on the first upload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "temp_dir",
                reason: "must not be empty".into(),
            });
        }
        if self
            .file_prefix
            .chars()
            .any(|c| std::path::is_separator(c) || c.is_control())
        {
            return Err(ConfigError::InvalidValue {
                field: "file_prefix",
                reason: format!("{:?} contains a path separator or control character", self.file_prefix),
            });
        }
        if self.max_upload_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_upload_bytes",
                reason: "must be greater than zero when set".into(),
            });
        }
        if self.max_meta_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_meta_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Staging configuration rejected by [`StagingConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid staging config field `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
