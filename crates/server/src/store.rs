//! Persistence seam for upload jobs and ingest tasks.
//!
//! Handlers only see [`UploadJobStore`]. [`MemoryJobStore`] keeps everything
//! in `DashMap`s and is what the server runs with out of the box.
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::model::{FileUploadJob, IngestTask, JobStatus, NewIngestTask};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file upload job {0} not found")]
    JobNotFound(i64),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UploadJobStore: Send + Sync {
    /// Open a new job in [`JobStatus::Running`].
    async fn start_job(&self, user_email: Option<String>) -> StoreResult<FileUploadJob>;

    async fn get_job(&self, job_id: i64) -> StoreResult<FileUploadJob>;

    async fn create_ingest_task(&self, task: NewIngestTask) -> StoreResult<IngestTask>;

    /// Set `last_ingest` to `at` and count one more file against the job.
    async fn touch_last_ingest(&self, job_id: i64, at: DateTime<Utc>) -> StoreResult<FileUploadJob>;

    /// Count one rejected file against the job.
    async fn record_failed_file(&self, job_id: i64) -> StoreResult<FileUploadJob>;

    /// Tasks for a job in creation order.
    async fn list_tasks(&self, job_id: i64) -> StoreResult<Vec<IngestTask>>;
}

#[derive(Debug)]
pub struct MemoryJobStore {
    jobs: DashMap<i64, FileUploadJob>,
    tasks: DashMap<i64, IngestTask>,
    next_job_id: AtomicI64,
    next_task_id: AtomicI64,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self {
            jobs: DashMap::new(),
            tasks: DashMap::new(),
            next_job_id: AtomicI64::new(1),
            next_task_id: AtomicI64::new(1),
        }
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_job(
        &self,
        job_id: i64,
        update: impl FnOnce(&mut FileUploadJob),
    ) -> StoreResult<FileUploadJob> {
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;
        update(job.value_mut());
        Ok(job.clone())
    }
}

#[async_trait]
impl UploadJobStore for MemoryJobStore {
    async fn start_job(&self, user_email: Option<String>) -> StoreResult<FileUploadJob> {
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let job = FileUploadJob {
            id,
            user_email,
            status: JobStatus::Running,
            status_message: String::new(),
            start_time: Utc::now(),
            end_time: None,
            last_ingest: None,
            total_files: 0,
            failed_files: 0,
        };
        self.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: i64) -> StoreResult<FileUploadJob> {
        self.jobs
            .get(&job_id)
            .map(|job| job.clone())
            .ok_or(StoreError::JobNotFound(job_id))
    }

    async fn create_ingest_task(&self, task: NewIngestTask) -> StoreResult<IngestTask> {
        if !self.jobs.contains_key(&task.job_id) {
            return Err(StoreError::JobNotFound(task.job_id));
        }
        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = IngestTask {
            id,
            file_name: task.file_name,
            request_id: task.request_id,
            job_id: task.job_id,
            file_type: task.file_type,
        };
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn touch_last_ingest(&self, job_id: i64, at: DateTime<Utc>) -> StoreResult<FileUploadJob> {
        self.update_job(job_id, |job| {
            job.last_ingest = Some(at);
            job.total_files += 1;
        })
    }

    async fn record_failed_file(&self, job_id: i64) -> StoreResult<FileUploadJob> {
        self.update_job(job_id, |job| job.failed_files += 1)
    }

    async fn list_tasks(&self, job_id: i64) -> StoreResult<Vec<IngestTask>> {
        if !self.jobs.contains_key(&job_id) {
            return Err(StoreError::JobNotFound(job_id));
        }
        let mut tasks: Vec<IngestTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.job_id == job_id)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }
}
