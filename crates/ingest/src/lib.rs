//! Upload Ingest Layer
//!
//! This is where uploaded files enter the system. A client streams a body at
//! us with a declared type; we copy it to a staged file on disk and validate
//! it in the same pass, so nothing is ever buffered whole in memory.
//!
//! ## What we do here
//!
//! - **Tee the upload** - Every byte read from the client is written to the
//!   staged file before the validator sees it. The file is a 1:1 copy.
//! - **Scan structured documents** - A token-level scan confirms a top-level
//!   `data` array and a `meta` record with a recognized category. Malformed
//!   `meta` candidates are skipped, not fatal.
//! - **Sniff archives** - The first four bytes must be the zip local file
//!   header. Nothing else about the archive is checked.
//! - **Keep or purge** - Valid uploads are kept and their path handed back.
//!   Anything else deletes the partial file and returns the original error.
//! - **Report through an injected sink** - Skipped `meta` values, lifecycle
//!   transitions and cleanup failures go to an [`IngestEvents`]
//!   implementation; [`TracingEvents`] is the default.
//!
//! ## Main entry point
//!
//! Build an [`IngestFileStager`] from a [`StagingConfig`] and call
//! [`IngestFileStager::stage`] with the body and its [`FileType`]. For one-off
//! calls, [`stage_and_validate`] does the same and returns just the path.
//!
//! ```text
//! body ──► Validator::for_file_type ──► temp file (Created)
//!                                           │
//!                         tee + scan / sniff (Validating)
//!                                           │
//!                      ┌────────────────────┴───────────────────┐
//!                  Committed                              PurgedOnFailure
//!               (path returned)                      (original error returned)
//! ```
//!
//! ## Example
//!
//! ```
//! use ingest::{file_type_for_content_type, DataType, IngestFileStager, StagingConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let stager = IngestFileStager::new(StagingConfig::new(dir.path())).unwrap();
//!
//! let body = br#"{"meta":{"type":"groups","methods":5,"version":6},"data":[{"name":"x"}]}"#;
//! let file_type = file_type_for_content_type("application/json; charset=utf-8");
//! let staged = stager.stage(&body[..], file_type).unwrap();
//!
//! assert_eq!(staged.metadata.unwrap().data_type, DataType::Groups);
//! assert_eq!(std::fs::read(&staged.path).unwrap(), body);
//! ```
//!
mod archive;
mod config;
mod content_type;
mod error;
mod events;
mod pipeline;
mod scanner;
mod staging;
mod tee;
mod trail;
mod types;

pub use crate::archive::{check_zip_signature, ZIP_LOCAL_FILE_HEADER};
pub use crate::config::{ConfigError, StagingConfig, DEFAULT_MAX_META_BYTES};
pub use crate::content_type::{file_type_for_content_type, JSON_MEDIA_TYPE, ZIP_MEDIA_TYPES};
pub use crate::error::{IngestError, IoStage, ValidationError};
pub use crate::events::{
    IngestEvent, IngestEvents, MetaSkipReason, RecordingEvents, StagingState, TracingEvents,
};
pub use crate::pipeline::{PipelineLimits, Validated, Validator};
pub use crate::scanner::{scan_tags, skip_bom, UTF8_BOM};
pub use crate::staging::{stage_and_validate, IngestFileStager, StagedFile};
pub use crate::tee::{TeeFault, TeeReader};
pub use crate::types::{CollectionMethods, DataType, FileType, Metadata, UnrecognizedDataType};
