//! Ingest Server - HTTP file-upload API
//!
//! This crate exposes the `ingest` staging pipeline over HTTP. Clients open
//! an upload job, stream files into it, and each accepted file becomes an
//! ingest task pointing at a staged artifact on disk.
//!
//! - **Streaming uploads**: request bodies are bridged chunk by chunk into a
//!   blocking staging worker and never buffered whole
//! - **Validation**: JSON uploads must carry `meta` and `data` tags, zip
//!   uploads must start with the zip signature
//! - **Job bookkeeping**: jobs and ingest tasks behind the [`UploadJobStore`]
//!   trait, in memory by default
//!
//! # Features
//!
//! - **Authentication**: API key-based authentication with rate limiting
//! - **Middleware**: Request ID tracking, structured logging, timeouts, CORS
//! - **Configuration**: Environment variable and file-based configuration
//! - **Error Handling**: JSON error bodies with stable error codes
//! - **Graceful Shutdown**: Proper signal handling for production deployments
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints (No Authentication)
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check (staging directory present)
//!
//! ## Protected Endpoints (API Key Required)
//!
//! - `POST /api/v2/file-upload/start` - Open an upload job (201)
//! - `GET /api/v2/file-upload/{file_upload_job_id}` - Fetch a job
//! - `GET /api/v2/file-upload/{file_upload_job_id}/tasks` - List its ingest tasks
//! - `POST /api/v2/file-upload/{file_upload_job_id}` - Upload one file (202)

pub mod app;
pub mod body;
pub mod config;
pub mod error;
pub mod middleware;
pub mod model;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
pub use store::{MemoryJobStore, UploadJobStore};
