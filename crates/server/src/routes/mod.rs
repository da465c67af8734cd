//! API route handlers
//!
//! - `health`: Liveness and readiness checks
//! - `file_upload`: Upload jobs, streamed file uploads and their ingest tasks

pub mod file_upload;
pub mod health;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// Returns server information including version and available endpoints.
/// This is the root endpoint (GET /) and requires no authentication.
///
/// # Response
///
/// ```json
/// {
///   "name": "Ingest Server",
///   "version": "0.1.0",
///   "api_version": "v2",
///   "endpoints": ["..."]
/// }
/// ```
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Ingest Server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v2",
        "endpoints": [
            "/api/v2/file-upload/start",
            "/api/v2/file-upload/{file_upload_job_id}",
            "/api/v2/file-upload/{file_upload_job_id}/tasks",
            "/health",
            "/ready"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
