//! Tee-and-validate: copy an upload into a sink while validating it.
//!
//! ```text
//! source ──► TeeReader ──► validator (scan / sniff) ──► drain
//!               │
//!               └──► sink (byte-for-byte copy)
//! ```
//!
//! Validation and draining are separate phases. The validator reads only as
//! far as it needs to reach a verdict; the drain then pulls the remainder of
//! the source through the tee so the sink always ends up with the complete
//! upload on success.
use std::io::{self, BufReader, Read, Write};

use crate::archive::check_zip_signature;
use crate::config::{StagingConfig, DEFAULT_MAX_META_BYTES};
use crate::error::{IngestError, IoStage};
use crate::events::IngestEvents;
use crate::scanner::{scan_tags, skip_bom};
use crate::tee::{TeeFault, TeeReader};
use crate::types::{FileType, Metadata};

/// Limits applied to a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub max_upload_bytes: Option<u64>,
    pub max_meta_bytes: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: None,
            max_meta_bytes: DEFAULT_MAX_META_BYTES,
        }
    }
}

impl From<&StagingConfig> for PipelineLimits {
    fn from(config: &StagingConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            max_meta_bytes: config.max_meta_bytes,
        }
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Decoded `meta` member; `None` for archives.
    pub metadata: Option<Metadata>,
    pub bytes_copied: u64,
}

/// Validation strategy for each declared [`FileType`] that has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    StructuredDocument,
    Archive,
}

impl Validator {
    /// Select the validator for a declared type. [`FileType::Invalid`] has
    /// none and fails here, before anything is read or written.
    pub fn for_file_type(file_type: FileType) -> Result<Self, IngestError> {
        match file_type {
            FileType::StructuredDocument => Ok(Validator::StructuredDocument),
            FileType::Archive => Ok(Validator::Archive),
            FileType::Invalid => Err(IngestError::UnsupportedFileType(file_type)),
        }
    }

    pub fn file_type(self) -> FileType {
        match self {
            Validator::StructuredDocument => FileType::StructuredDocument,
            Validator::Archive => FileType::Archive,
        }
    }

    /// Copy `source` into `sink` and validate it in the same pass.
    ///
    /// `sink` is not flushed; that is the caller's job.
    pub fn write_and_validate<R: Read, W: Write>(
        self,
        source: R,
        sink: W,
        limits: PipelineLimits,
        events: &dyn IngestEvents,
    ) -> Result<Validated, IngestError> {
        let mut tee = TeeReader::new(source, sink, limits.max_upload_bytes);

        let outcome = match self {
            Validator::StructuredDocument => {
                validate_structured(&mut tee, limits.max_meta_bytes, events)
            }
            Validator::Archive => validate_archive(&mut tee),
        };

        match outcome {
            Ok(metadata) => Ok(Validated {
                metadata,
                bytes_copied: tee.bytes_copied(),
            }),
            Err(err) => Err(attribute_fault(tee.take_fault(), err)),
        }
    }
}

fn validate_structured<R: Read>(
    tee: &mut R,
    max_meta_bytes: usize,
    events: &dyn IngestEvents,
) -> Result<Option<Metadata>, IngestError> {
    let mut reader = BufReader::new(tee);
    skip_bom(&mut reader)?;
    let metadata = scan_tags(&mut reader, max_meta_bytes, events)?;
    drain(&mut reader)?;
    Ok(Some(metadata))
}

fn validate_archive<R: Read>(tee: &mut R) -> Result<Option<Metadata>, IngestError> {
    check_zip_signature(tee)?;
    drain(tee)?;
    Ok(None)
}

/// Read everything left in `reader` and throw it away.
fn drain<R: Read + ?Sized>(reader: &mut R) -> Result<u64, IngestError> {
    io::copy(reader, &mut io::sink()).map_err(|err| IngestError::io(IoStage::ReadSource, err))
}

/// A read error raised by the tee itself hides the real cause; put it back.
fn attribute_fault(fault: Option<TeeFault>, err: IngestError) -> IngestError {
    match fault {
        Some(TeeFault::Sink(source)) => IngestError::io(IoStage::WriteArtifact, source),
        Some(TeeFault::LimitExceeded { limit }) => IngestError::PayloadTooLarge { limit },
        None => err,
    }
}
