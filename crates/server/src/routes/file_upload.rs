//! File-upload job endpoints.
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `/api/v2/file-upload/start` | 201 + job |
//! | GET | `/api/v2/file-upload/{file_upload_job_id}` | 200 + job |
//! | GET | `/api/v2/file-upload/{file_upload_job_id}/tasks` | 200 + tasks |
//! | POST | `/api/v2/file-upload/{file_upload_job_id}` | 202 + ingest task |
use crate::app;
use crate::body::body_reader;
use crate::error::{ServerError, ServerResult};
use crate::middleware::RequestId;
use crate::model::{FileUploadJob, IngestTask};
use crate::state::ServerState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use ingest::{file_type_for_content_type, FileType};
use serde::Deserialize;
use std::sync::Arc;

/// Optional body for starting a job
#[derive(Debug, Default, Deserialize)]
pub struct StartFileUploadRequest {
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Open a new upload job. The body may be empty.
pub async fn start_file_upload_job(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<FileUploadJob>)> {
    let request: StartFileUploadRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartFileUploadRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let job = state.store.start_job(request.user_email).await?;
    tracing::info!(job_id = job.id, "file_upload_job_started");
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_file_upload_job(
    State(state): State<Arc<ServerState>>,
    Path(job_id): Path<String>,
) -> ServerResult<Json<FileUploadJob>> {
    let job_id = parse_job_id(&job_id)?;
    Ok(Json(state.store.get_job(job_id).await?))
}

pub async fn list_ingest_tasks(
    State(state): State<Arc<ServerState>>,
    Path(job_id): Path<String>,
) -> ServerResult<Json<Vec<IngestTask>>> {
    let job_id = parse_job_id(&job_id)?;
    Ok(Json(state.store.list_tasks(job_id).await?))
}

/// Stream one file into staging under an existing job.
///
/// The body is never buffered whole: it is forwarded chunk by chunk to a
/// blocking staging worker. Checks run in this order:
///
/// 1. `Content-Type` must map to JSON or zip (400)
/// 2. the job id must be an integer (400)
/// 3. the job must exist (404)
/// 4. the file must validate (400) and fit the upload cap (413)
pub async fn process_file_upload(
    State(state): State<Arc<ServerState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ServerResult<(StatusCode, Json<IngestTask>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let file_type = file_type_for_content_type(content_type);
    if file_type == FileType::Invalid {
        return Err(ServerError::UnsupportedContentType);
    }
    let job_id = parse_job_id(&job_id)?;

    let (reader, pump) = body_reader(body, state.config.body_channel_capacity);
    let (result, ()) = tokio::join!(
        app::ingest_file(
            state.store.as_ref(),
            &state.stager,
            &request_id,
            job_id,
            file_type,
            reader,
        ),
        pump
    );

    Ok((StatusCode::ACCEPTED, Json(result?)))
}

fn parse_job_id(raw: &str) -> ServerResult<i64> {
    raw.parse::<i64>().map_err(|_| ServerError::MalformedId)
}
