//! Router-level tests for the file-upload API.

use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_router, ServerConfig, ServerState};
use tempfile::TempDir;
use tower::ServiceExt;

const API_KEY: &str = "test-api-key";
const SCENARIO_A: &[u8] = br#"{"meta":{"type":"users","methods":1,"version":5},"data":[]}"#;

struct TestServer {
    router: Router,
    staging: TempDir,
}

impl TestServer {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let staging = tempfile::tempdir().expect("staging dir");
        let mut config = ServerConfig {
            staging_dir: Some(staging.path().to_path_buf()),
            rate_limit_per_minute: 1000,
            ..ServerConfig::default()
        };
        config.api_keys.insert(API_KEY.to_string());
        adjust(&mut config);

        let state = Arc::new(ServerState::new(config).expect("server state"));
        Self {
            router: build_router(state),
            staging,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    async fn start_job(&self) -> i64 {
        let (status, _, body) = self
            .send(
                Request::post("/api/v2/file-upload/start")
                    .header("x-api-key", API_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn upload(&self, job: &str, content_type: &str, body: Body) -> (StatusCode, Value) {
        let (status, _, json) = self
            .send(
                Request::post(format!("/api/v2/file-upload/{job}"))
                    .header("x-api-key", API_KEY)
                    .header("content-type", content_type)
                    .body(body)
                    .unwrap(),
            )
            .await;
        (status, json)
    }

    fn staged_count(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_and_root_are_public() {
    let server = TestServer::new();

    let (status, _, body) = server
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = server
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["staging"], "ready");

    let (status, _, body) = server
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_version"], "v2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_requires_a_key() {
    let server = TestServer::new();

    let (status, _, body) = server
        .send(
            Request::post("/api/v2/file-upload/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_FAILED");

    let (status, _, _) = server
        .send(
            Request::post("/api/v2/file-upload/start")
                .header("authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_job_accepts_optional_owner() {
    let server = TestServer::new();

    let (status, _, body) = server
        .send(
            Request::post("/api/v2/file-upload/start")
                .header("x-api-key", API_KEY)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user_email":"analyst@example.com"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "running");
    assert_eq!(body["user_email"], "analyst@example.com");
    assert_eq!(body["total_files"], 0);

    let (status, _, body) = server
        .send(
            Request::post("/api/v2/file-upload/start")
                .header("x-api-key", API_KEY)
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_upload_is_accepted_and_recorded() {
    let server = TestServer::new();
    let job = server.start_job().await;

    let (status, _, task) = server
        .send(
            Request::post(format!("/api/v2/file-upload/{job}"))
                .header("x-api-key", API_KEY)
                .header("x-request-id", "req-upload-1")
                .header("content-type", "application/json; charset=utf-8")
                .body(Body::from(SCENARIO_A))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(task["job_id"], job);
    assert_eq!(task["request_id"], "req-upload-1");
    assert_eq!(task["file_type"], "structured_document");

    let staged = task["file_name"].as_str().unwrap();
    assert_eq!(std::fs::read(staged).unwrap(), SCENARIO_A);

    let (status, _, job_body) = server
        .send(
            Request::get(format!("/api/v2/file-upload/{job}"))
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job_body["total_files"], 1);
    assert!(job_body["last_ingest"].is_string());

    let (status, _, tasks) = server
        .send(
            Request::get(format!("/api/v2/file-upload/{job}/tasks"))
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zip_upload_accepts_every_zip_media_type() {
    let server = TestServer::new();
    let job = server.start_job().await.to_string();

    for content_type in [
        "application/zip",
        "application/x-zip-compressed",
        "application/zip-compressed",
    ] {
        let (status, task) = server
            .upload(&job, content_type, Body::from(&b"PK\x03\x04archive"[..]))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{content_type}");
        assert_eq!(task["file_type"], "archive");
    }
    assert_eq!(server.staged_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_content_type_is_rejected_first() {
    let server = TestServer::new();

    // Checked before the id, so even a malformed id gets this message.
    let (status, body) = server
        .upload("not-a-number", "text/plain", Body::from("hello"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Content type must be application/json or application/zip"
    );
    assert_eq!(server.staged_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_and_unknown_job_ids() {
    let server = TestServer::new();

    let (status, body) = server
        .upload("abc", "application/json", Body::from(SCENARIO_A))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ID_MALFORMED");

    let (status, body) = server
        .upload("424242", "application/json", Body::from(SCENARIO_A))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(server.staged_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validation_failures_are_bad_requests_and_purged() {
    let server = TestServer::new();
    let job = server.start_job().await.to_string();

    let (status, body) = server
        .upload(&job, "application/json", Body::from(r#"{"data":[]}"#))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "FILE_VALIDATION_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no valid meta tag found"));

    let (status, body) = server
        .upload(&job, "application/zip", Body::from(&b"\x89PNG\r\n\x1a\n"[..]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("failed to find zip file header"));

    assert_eq!(server.staged_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_upload_is_payload_too_large() {
    let server = TestServer::with_config(|config| config.max_upload_mb = Some(1));
    let job = server.start_job().await.to_string();

    let mut archive = b"PK\x03\x04".to_vec();
    archive.resize(2 * 1024 * 1024, 0x5A);
    let (status, body) = server
        .upload(&job, "application/zip", Body::from(archive))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(server.staged_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_upload_survives_many_small_chunks() {
    let server = TestServer::with_config(|config| config.body_channel_capacity = 1);
    let job = server.start_job().await.to_string();

    let mut document = br#"{"meta":{"type":"gpos","version":6},"data":["#.to_vec();
    for i in 0..500 {
        if i > 0 {
            document.push(b',');
        }
        document.extend_from_slice(format!(r#"{{"gpo":{i}}}"#).as_bytes());
    }
    document.extend_from_slice(b"]}");

    let chunks: Vec<Result<Bytes, io::Error>> = document
        .chunks(7)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    let (status, task) = server
        .upload(
            &job,
            "application/json",
            Body::from_stream(futures::stream::iter(chunks)),
        )
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let staged = std::fs::read(task["file_name"].as_str().unwrap()).unwrap();
    assert_eq!(staged, document);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_disconnect_is_a_hidden_internal_error() {
    let server = TestServer::new();
    let job = server.start_job().await.to_string();

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(br#"{"meta":{"type":"users","version":5},"data":[1,"#)),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset")),
    ];
    let (status, body) = server
        .upload(
            &job,
            "application/json",
            Body::from_stream(futures::stream::iter(chunks)),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INGEST_ERROR");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains(&server.staging.path().display().to_string()));
    assert_eq!(server.staged_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_id_is_echoed_or_generated() {
    let server = TestServer::new();

    let (_, headers, _) = server
        .send(
            Request::get("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(headers["x-request-id"], "abc-123");

    let (_, headers, _) = server
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    let generated = headers["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_routes_are_not_found() {
    let server = TestServer::new();
    let (status, _, body) = server
        .send(Request::get("/api/v1/process").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
