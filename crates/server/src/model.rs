//! File-upload job bookkeeping records.
use chrono::{DateTime, Utc};
use ingest::FileType;
use serde::{Deserialize, Serialize};

/// Lifecycle of a [`FileUploadJob`]. Discriminants are the stored codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Invalid = -1,
    Ready = 0,
    Running = 1,
    Complete = 2,
    Canceled = 3,
    TimedOut = 4,
    Failed = 5,
    Ingesting = 6,
    Analyzing = 7,
    PartiallyComplete = 8,
}

impl JobStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Unknown codes map to [`JobStatus::Invalid`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => JobStatus::Ready,
            1 => JobStatus::Running,
            2 => JobStatus::Complete,
            3 => JobStatus::Canceled,
            4 => JobStatus::TimedOut,
            5 => JobStatus::Failed,
            6 => JobStatus::Ingesting,
            7 => JobStatus::Analyzing,
            8 => JobStatus::PartiallyComplete,
            _ => JobStatus::Invalid,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Complete
                | JobStatus::Canceled
                | JobStatus::TimedOut
                | JobStatus::Failed
                | JobStatus::PartiallyComplete
        )
    }
}

/// A client's upload session. Files are posted against its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadJob {
    pub id: i64,
    pub user_email: Option<String>,
    pub status: JobStatus,
    pub status_message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_ingest: Option<DateTime<Utc>>,
    pub total_files: u64,
    pub failed_files: u64,
}

/// A staged file waiting for downstream ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestTask {
    pub id: i64,
    /// Path of the staged artifact.
    pub file_name: String,
    pub request_id: String,
    pub job_id: i64,
    pub file_type: FileType,
}

/// Fields supplied when creating an [`IngestTask`]; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngestTask {
    pub file_name: String,
    pub request_id: String,
    pub job_id: i64,
    pub file_type: FileType,
}
