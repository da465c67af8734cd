//! Workspace umbrella crate for the upload ingest gate.
//!
//! This crate wires the streaming staging pipeline from `upload-ingest` to a
//! versioned YAML configuration so callers (and the `ingest-gate` binary) can
//! validate and stage local files with a single call. The HTTP surface lives
//! in the `ingest-server` workspace member.

pub mod config;

pub use config::{ConfigLoadError, GateConfig, StagingYamlConfig};
pub use ingest::{
    file_type_for_content_type, stage_and_validate, CollectionMethods, ConfigError, DataType,
    FileType, IngestError, IngestEvent, IngestEvents, IngestFileStager, IoStage, Metadata,
    RecordingEvents, StagedFile, StagingConfig, StagingState, TracingEvents, ValidationError,
};

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while staging a local file.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot infer file type of {0}; pass a content type")]
    UnknownFileType(PathBuf),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl GateError {
    /// Process exit code for the `ingest-gate` binary.
    ///
    /// Rejected uploads exit with `2` so scripts can tell them apart from
    /// operational failures (`1`).
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::Ingest(IngestError::Validation(_))
            | GateError::Ingest(IngestError::PayloadTooLarge { .. })
            | GateError::Ingest(IngestError::UnsupportedFileType(_))
            | GateError::UnknownFileType(_) => 2,
            _ => 1,
        }
    }
}

/// Guess the declared type from a file extension (`.json` or `.zip`).
pub fn file_type_for_path(path: &Path) -> FileType {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("json") => FileType::StructuredDocument,
        Some("zip") => FileType::Archive,
        _ => FileType::Invalid,
    }
}

/// Stage the file at `path` through the ingest pipeline.
///
/// `content_type` overrides the extension-based guess. On success the staged
/// copy lives under the configured staging directory; on any failure nothing
/// is left behind.
///
/// ```no_run
/// use ingest_gate::{stage_local_file, GateConfig};
///
/// let staged = stage_local_file("upload.json", None, &GateConfig::default())?;
/// println!("staged {} bytes at {}", staged.bytes_written, staged.path.display());
/// # Ok::<(), ingest_gate::GateError>(())
/// ```
pub fn stage_local_file(
    path: impl AsRef<Path>,
    content_type: Option<&str>,
    config: &GateConfig,
) -> Result<StagedFile, GateError> {
    let path = path.as_ref();
    let file_type = match content_type {
        Some(header) => file_type_for_content_type(header),
        None => match file_type_for_path(path) {
            FileType::Invalid => return Err(GateError::UnknownFileType(path.to_path_buf())),
            file_type => file_type,
        },
    };

    let stager = IngestFileStager::new(config.staging_config())
        .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;

    let source = File::open(path).map_err(|source| GateError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), %file_type, "staging_local_file");
    Ok(stager.stage(source, file_type)?)
}
