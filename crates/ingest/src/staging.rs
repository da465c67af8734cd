//! Staged artifacts: create, fill through the pipeline, then keep or purge.
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::Level;

use crate::config::{ConfigError, StagingConfig};
use crate::error::{IngestError, IoStage};
use crate::events::{IngestEvent, IngestEvents, StagingState, TracingEvents};
use crate::pipeline::{PipelineLimits, Validated, Validator};
use crate::types::{FileType, Metadata};

/// A committed artifact. The caller owns the file at `path` from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// `meta` member of a structured document; `None` for archives.
    pub metadata: Option<Metadata>,
    pub bytes_written: u64,
}

/// Stages uploads into `temp_dir` according to a [`StagingConfig`].
///
/// Each call to [`stage`](Self::stage) is independent; a stager can be shared
/// across threads.
#[derive(Clone)]
pub struct IngestFileStager {
    config: StagingConfig,
    events: Arc<dyn IngestEvents>,
}

impl std::fmt::Debug for IngestFileStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestFileStager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IngestFileStager {
    /// Validates `config` and reports through [`TracingEvents`].
    pub fn new(config: StagingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            events: Arc::new(TracingEvents),
        })
    }

    pub fn with_events(mut self, events: Arc<dyn IngestEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    /// Copy `body` into a fresh artifact while validating it as `file_type`.
    ///
    /// On success the artifact is kept and its path returned. On any failure
    /// the partial artifact is deleted and the original error is returned;
    /// a failed delete is reported as an event, never as the error.
    pub fn stage<R: Read>(&self, body: R, file_type: FileType) -> Result<StagedFile, IngestError> {
        let start = Instant::now();
        let span = tracing::span!(Level::INFO, "ingest.stage", file_type = %file_type);
        let _guard = span.enter();

        let result = self.stage_inner(body, file_type);
        let elapsed_micros = start.elapsed().as_micros();

        self.events.record(IngestEvent::Finished {
            file_type,
            elapsed_micros,
            outcome: match &result {
                Ok(staged) => Ok(staged.bytes_written),
                Err(err) => Err(err.to_string()),
            },
        });
        result
    }

    fn stage_inner<R: Read>(&self, body: R, file_type: FileType) -> Result<StagedFile, IngestError> {
        let validator = Validator::for_file_type(file_type)?;

        let artifact = tempfile::Builder::new()
            .prefix(&self.config.file_prefix)
            .tempfile_in(&self.config.temp_dir)
            .map_err(|err| IngestError::io(IoStage::CreateArtifact, err))?;
        self.transition(artifact.path(), StagingState::Created, StagingState::Validating);

        let validated = match self.fill(&artifact, validator, body) {
            Ok(validated) => validated,
            Err(err) => {
                self.purge(artifact);
                return Err(err);
            }
        };

        let path = match artifact.keep() {
            Ok((_, path)) => path,
            Err(persist) => {
                let tempfile::PersistError { error, file } = persist;
                self.purge(file);
                return Err(IngestError::io(IoStage::PersistArtifact, error));
            }
        };
        self.transition(&path, StagingState::Validating, StagingState::Committed);

        Ok(StagedFile {
            path,
            file_type,
            metadata: validated.metadata,
            bytes_written: validated.bytes_copied,
        })
    }

    fn fill<R: Read>(
        &self,
        artifact: &NamedTempFile,
        validator: Validator,
        body: R,
    ) -> Result<Validated, IngestError> {
        let mut writer = BufWriter::new(artifact.as_file());
        let validated = validator.write_and_validate(
            body,
            &mut writer,
            PipelineLimits::from(&self.config),
            self.events.as_ref(),
        )?;
        writer
            .flush()
            .map_err(|err| IngestError::io(IoStage::WriteArtifact, err))?;
        Ok(validated)
    }

    fn purge(&self, artifact: NamedTempFile) {
        let path = artifact.path().to_path_buf();
        match artifact.close() {
            Ok(()) => self.transition(&path, StagingState::Validating, StagingState::PurgedOnFailure),
            Err(err) => self.events.record(IngestEvent::CleanupFailed {
                path,
                error: err.to_string(),
            }),
        }
    }

    fn transition(&self, path: &Path, from: StagingState, to: StagingState) {
        debug_assert!(from.can_transition_to(to));
        self.events.record(IngestEvent::StateChanged {
            path: path.to_path_buf(),
            from,
            to,
        });
    }
}

/// One-shot staging with default event reporting.
///
/// ```rust
/// use ingest::{stage_and_validate, FileType, StagingConfig};
///
/// let dir = tempfile::tempdir().unwrap();
/// let body = br#"{"meta":{"type":"computers","version":6},"data":[]}"#;
/// let path = stage_and_validate(&body[..], FileType::StructuredDocument, &StagingConfig::new(dir.path())).unwrap();
/// assert_eq!(std::fs::read(&path).unwrap(), body);
/// ```
pub fn stage_and_validate<R: Read>(
    body: R,
    file_type: FileType,
    config: &StagingConfig,
) -> Result<PathBuf, IngestError> {
    let stager = IngestFileStager::new(config.clone())?;
    stager.stage(body, file_type).map(|staged| staged.path)
}
