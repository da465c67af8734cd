use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ingest::IngestError;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Message returned for 500s; details stay in the logs.
const INTERNAL_ERROR_MESSAGE: &str = "an internal error has occurred that is preventing the service from servicing this request";

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Content type must be application/json or application/zip")]
    UnsupportedContentType,

    #[error("id is malformed")]
    MalformedId,

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::BadRequest(_)
            | ServerError::UnsupportedContentType
            | ServerError::MalformedId => StatusCode::BAD_REQUEST,
            ServerError::Ingest(err) => StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ServerError::Store(StoreError::JobNotFound(_)) | ServerError::NotFound => {
                StatusCode::NOT_FOUND
            }
            ServerError::Store(StoreError::Unavailable(_))
            | ServerError::Internal(_)
            | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            ServerError::MalformedId => "ID_MALFORMED",
            ServerError::Ingest(IngestError::Validation(_)) => "FILE_VALIDATION_FAILED",
            ServerError::Ingest(IngestError::PayloadTooLarge { .. }) => "PAYLOAD_TOO_LARGE",
            ServerError::Ingest(IngestError::UnsupportedFileType(_)) => "UNSUPPORTED_FILE_TYPE",
            ServerError::Ingest(_) => "INGEST_ERROR",
            ServerError::Store(StoreError::JobNotFound(_)) | ServerError::NotFound => "NOT_FOUND",
            ServerError::Store(_) | ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Client-facing message. Server-side failures never leak paths or
    /// causes.
    fn public_message(&self) -> String {
        match self {
            ServerError::Store(StoreError::JobNotFound(_)) | ServerError::NotFound => {
                "resource not found".to_string()
            }
            err if err.status_code().is_server_error() => INTERNAL_ERROR_MESSAGE.to_string(),
            err => err.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request_failed");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.public_message(),
            },
        });

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}
