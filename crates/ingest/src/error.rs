//! Error types produced by the ingest crate.
//!
//! Two layers:
//!
//! | Type | Raised by | Meaning |
//! |------|-----------|---------|
//! | [`ValidationError`] | scanner, sniffer | the payload itself is structurally wrong |
//! | [`IngestError`] | pipeline, staging | any failure of a staging call, with the stage that failed |
//!
//! Validation failures are permanent for a given payload. I/O failures may be
//! transient; [`IngestError::is_retryable`] tells them apart.
//!
//! # HTTP Status Code Mapping
//!
//! ```rust
//! use ingest::{IngestError, ValidationError};
//!
//! let err = IngestError::from(ValidationError::MetaTagNotFound);
//! assert_eq!(err.http_status_code(), 400);
//! assert!(!err.is_retryable());
//! ```
use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::FileType;

/// Structural reasons a payload was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// Neither a recognized `meta` nor an array-valued `data` member was seen.
    #[error("no valid meta tag or data tag found")]
    NoTagFound,

    /// A recognized `meta` member was seen but no array-valued `data`.
    #[error("no data tag found")]
    DataTagNotFound,

    /// An array-valued `data` member was seen but no recognized `meta`.
    #[error("no valid meta tag found")]
    MetaTagNotFound,

    /// The document is not well-formed JSON up to the point it was read.
    #[error("file is not valid json: {0}")]
    InvalidJson(String),

    /// The stream does not start with the zip local-file-header signature.
    #[error("failed to find zip file header")]
    InvalidArchive,
}

/// Which step of a staging call an I/O failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    CreateArtifact,
    ReadSource,
    WriteArtifact,
    PersistArtifact,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IoStage::CreateArtifact => "creating ingest file",
            IoStage::ReadSource => "reading upload body",
            IoStage::WriteArtifact => "writing ingest file",
            IoStage::PersistArtifact => "persisting ingest file",
        };
        f.write_str(label)
    }
}

/// Errors surfaced by [`stage_and_validate`](crate::stage_and_validate) and
/// the lower-level pipeline entry points.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    /// The declared type has no validator. Nothing was written.
    #[error("no validator registered for file type {0}")]
    UnsupportedFileType(FileType),

    /// The payload failed structural validation; the artifact was purged.
    #[error("file validation failure: {0}")]
    Validation(#[from] ValidationError),

    /// Source, sink, or filesystem failure.
    #[error("{stage}: {source}")]
    Io {
        stage: IoStage,
        #[source]
        source: io::Error,
    },

    /// More bytes than the configured cap were read from the source.
    #[error("payload exceeds size limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IngestError {
    pub(crate) fn io(stage: IoStage, source: io::Error) -> Self {
        IngestError::Io { stage, source }
    }

    /// The structural reason, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            IngestError::Validation(reason) => Some(reason),
            _ => None,
        }
    }

    /// True when a fresh attempt with the same payload could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Io { .. })
    }

    /// Suggested HTTP status for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            IngestError::UnsupportedFileType(_) | IngestError::Validation(_) => 400,
            IngestError::PayloadTooLarge { .. } => 413,
            IngestError::Io { .. } | IngestError::Config(_) => 500,
        }
    }
}
