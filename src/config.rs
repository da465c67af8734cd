//! YAML Configuration File Support
//!
//! Loads staging settings for the offline `ingest-gate` binary and for
//! embedders that want a single versioned file instead of code.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! # Ingest gate configuration
//! version: "1.0"
//! name: "collector drop"
//!
//! staging:
//!   temp_dir: "/var/lib/ingest-gate/staging"
//!   file_prefix: "bh"
//!   max_upload_bytes: 1073741824
//!   max_meta_bytes: 65536
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ingest::{StagingConfig, DEFAULT_MAX_META_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GateConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Upload staging configuration
    #[serde(default)]
    pub staging: StagingYamlConfig,
}

impl GateConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: GateConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.staging
            .to_staging_config()
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))
    }

    /// Staging settings for [`ingest::IngestFileStager`].
    pub fn staging_config(&self) -> StagingConfig {
        self.staging.to_staging_config()
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            staging: StagingYamlConfig::default(),
        }
    }
}

/// Staging YAML configuration. Unset fields fall back to
/// [`StagingConfig::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingYamlConfig {
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub file_prefix: Option<String>,

    #[serde(default)]
    pub max_upload_bytes: Option<u64>,

    #[serde(default = "default_max_meta_bytes")]
    pub max_meta_bytes: usize,
}

impl StagingYamlConfig {
    pub fn to_staging_config(&self) -> StagingConfig {
        let mut config = match &self.temp_dir {
            Some(dir) => StagingConfig::new(dir),
            None => StagingConfig::default(),
        };
        if let Some(prefix) = &self.file_prefix {
            config.file_prefix = prefix.clone();
        }
        config.max_upload_bytes = self.max_upload_bytes;
        config.max_meta_bytes = self.max_meta_bytes;
        config
    }
}

fn default_max_meta_bytes() -> usize {
    DEFAULT_MAX_META_BYTES
}
