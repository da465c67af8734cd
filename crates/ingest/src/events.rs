//! Injected reporting for non-fatal anomalies and artifact lifecycle.
//!
//! Nothing in the staging path logs through a global. Callers hand in an
//! [`IngestEvents`] implementation; [`TracingEvents`] forwards to `tracing`
//! and [`RecordingEvents`] keeps everything in memory.
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::types::FileType;

/// Why a `meta` candidate was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaSkipReason {
    /// The value did not decode into a metadata record.
    Malformed(String),
    /// The value decoded but named a category outside the closed set.
    UnrecognizedType(String),
    /// The value was larger than the configured capture cap.
    Oversized { limit: usize },
}

/// Lifecycle of a staged artifact.
///
/// `Created → Validating → {Committed | PurgedOnFailure}`; the last two are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    Created,
    Validating,
    Committed,
    PurgedOnFailure,
}

impl StagingState {
    pub fn can_transition_to(self, next: StagingState) -> bool {
        matches!(
            (self, next),
            (StagingState::Created, StagingState::Validating)
                | (StagingState::Validating, StagingState::Committed)
                | (StagingState::Validating, StagingState::PurgedOnFailure)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StagingState::Committed | StagingState::PurgedOnFailure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    MetaTagSkipped { reason: MetaSkipReason },
    StateChanged { path: PathBuf, from: StagingState, to: StagingState },
    CleanupFailed { path: PathBuf, error: String },
    /// One staging run ended: bytes written on success, the error otherwise.
    Finished {
        file_type: FileType,
        elapsed_micros: u128,
        outcome: Result<u64, String>,
    },
}

/// Sink for [`IngestEvent`]s. Must never fail the calling operation.
pub trait IngestEvents: Send + Sync {
    fn record(&self, event: IngestEvent);
}

/// Default sink: structured `tracing` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl IngestEvents for TracingEvents {
    fn record(&self, event: IngestEvent) {
        match event {
            IngestEvent::MetaTagSkipped { reason } => match reason {
                MetaSkipReason::Malformed(detail) => {
                    warn!(error = %detail, "found invalid meta tag, skipping")
                }
                MetaSkipReason::UnrecognizedType(name) => {
                    warn!(data_type = %name, "meta tag has unrecognized type, skipping")
                }
                MetaSkipReason::Oversized { limit } => {
                    warn!(limit, "meta tag exceeds capture limit, skipping")
                }
            },
            IngestEvent::StateChanged { path, from, to } => match to {
                StagingState::Committed => {
                    info!(path = %path.display(), ?from, "ingest_file_committed")
                }
                StagingState::PurgedOnFailure => {
                    info!(path = %path.display(), ?from, "ingest_file_purged")
                }
                _ => debug!(path = %path.display(), ?from, ?to, "ingest_file_state"),
            },
            IngestEvent::CleanupFailed { path, error } => {
                error!(path = %path.display(), error = %error, "ingest_file_cleanup_failed")
            }
            IngestEvent::Finished {
                file_type,
                elapsed_micros,
                outcome,
            } => match outcome {
                Ok(bytes_written) => info!(
                    file_type = %file_type,
                    bytes_written,
                    elapsed_micros,
                    "ingest_file_staged"
                ),
                Err(error) => warn!(
                    file_type = %file_type,
                    elapsed_micros,
                    error = %error,
                    "ingest_file_rejected"
                ),
            },
        }
    }
}

/// Captures events for later inspection.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<IngestEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn events(&self) -> Vec<IngestEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn skipped_meta(&self) -> Vec<MetaSkipReason> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IngestEvent::MetaTagSkipped { reason } => Some(reason),
                _ => None,
            })
            .collect()
    }

    /// Target states of every recorded transition.
    pub fn states(&self) -> Vec<StagingState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IngestEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl IngestEvents for RecordingEvents {
    fn record(&self, event: IngestEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
