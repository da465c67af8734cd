//! Upload use case: stage a file against a job and record it.
use std::io::Read;

use chrono::Utc;
use ingest::{FileType, IngestError, IngestFileStager, StagedFile, Validator};

use crate::error::{ServerError, ServerResult};
use crate::model::{IngestTask, NewIngestTask};
use crate::store::UploadJobStore;

/// A staged file that has no ingest task yet.
///
/// Removed on drop unless [`keep`](Self::keep) was called, so a failed store
/// write or a cancelled request cannot leave a file nobody will pick up.
#[derive(Debug)]
struct PendingIngestFile {
    staged: StagedFile,
    kept: bool,
}

impl PendingIngestFile {
    fn new(staged: StagedFile) -> Self {
        Self {
            staged,
            kept: false,
        }
    }

    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for PendingIngestFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.staged.path) {
            tracing::error!(
                path = %self.staged.path.display(),
                error = %err,
                "orphaned_ingest_file_not_removed"
            );
        }
    }
}

/// Stage `body` as `file_type` under `job_id` and create its ingest task.
///
/// Order matters: the declared type is checked before the job lookup, and
/// the job lookup before any file is created. Staging runs on the blocking
/// pool since `body` is a synchronous reader.
pub async fn ingest_file<S, R>(
    store: &S,
    stager: &IngestFileStager,
    request_id: &str,
    job_id: i64,
    file_type: FileType,
    body: R,
) -> ServerResult<IngestTask>
where
    S: UploadJobStore + ?Sized,
    R: Read + Send + 'static,
{
    Validator::for_file_type(file_type)?;
    let job = store.get_job(job_id).await?;

    let worker = stager.clone();
    let staged = tokio::task::spawn_blocking(move || {
        worker.stage(body, file_type).map(PendingIngestFile::new)
    })
    .await
    .map_err(|err| ServerError::Internal(format!("staging worker failed: {err}")))?;

    let mut pending = match staged {
        Ok(pending) => pending,
        Err(err) => {
            if matches!(
                err,
                IngestError::Validation(_) | IngestError::PayloadTooLarge { .. }
            ) {
                if let Err(store_err) = store.record_failed_file(job.id).await {
                    tracing::warn!(job_id = job.id, error = %store_err, "failed_file_count_not_updated");
                }
            }
            return Err(err.into());
        }
    };

    let task = store
        .create_ingest_task(NewIngestTask {
            file_name: pending.staged.path.to_string_lossy().into_owned(),
            request_id: request_id.to_string(),
            job_id: job.id,
            file_type,
        })
        .await?;
    store.touch_last_ingest(job.id, Utc::now()).await?;
    pending.keep();

    tracing::info!(
        job_id = job.id,
        task_id = task.id,
        request_id = %request_id,
        file_type = %file_type,
        bytes_written = pending.staged.bytes_written,
        "ingest_task_created"
    );
    Ok(task)
}
