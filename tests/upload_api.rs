//! Upload API tests
//!
//! Drive the full router with `tower::ServiceExt::oneshot` against a
//! file-backed SQLite database and a temporary content root.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use file_intake::{
    app,
    config::{DEFAULT_MAX_FORM_MEMORY, DEFAULT_MAX_REQUEST_SIZE, DEFAULT_MAX_UPLOAD_SIZE},
    services::ingest_service::IngestService,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use tower::util::ServiceExt;

const BOUNDARY: &str = "file-intake-test-boundary";

const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0\x01\x01\0\0\x01\0\x01\0\0jpeg body";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0png body";
const ZIP: &[u8] = b"PK\x03\x04\x14\0\0\0\x08\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0zip body";
const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

struct TestApp {
    router: Router,
    service: IngestService,
    root: TempDir,
    _db_dir: TempDir,
}

/// Create an app backed by a pooled, file-backed database so concurrent
/// requests run on separate connections.
async fn create_test_app() -> TestApp {
    let root = TempDir::new().expect("Failed to create content root");
    let db_dir = TempDir::new().expect("Failed to create database directory");
    let options = SqliteConnectOptions::new()
        .filename(db_dir.path().join("files.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .expect("Failed to create test database"),
    );

    let service = IngestService::new(db, root.path(), DEFAULT_MAX_UPLOAD_SIZE, "Hard-coded user");
    service
        .files()
        .create_table()
        .await
        .expect("Failed to create files table");

    TestApp {
        router: app(service.clone(), DEFAULT_MAX_REQUEST_SIZE),
        service,
        root,
        _db_dir: db_dir,
    }
}

/// A multipart part: (field, optional filename, bytes).
type FormPart<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart_body(parts: &[FormPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    field, name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(parts: &[FormPart<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

fn stored_files(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, out);
            } else {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

// ============================================================================
// Root
// ============================================================================

#[tokio::test]
async fn test_root_greets() {
    let app = create_test_app().await;

    let response = send(&app, get_request("/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Welcome to our API Root!");
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_each_allowed_type_round_trips() {
    let cases: [(&str, &[u8]); 4] = [
        ("photo.jpg", JPEG),
        ("icon.png", PNG),
        ("bundle.zip", ZIP),
        ("paper.pdf", PDF),
    ];

    for (file_name, data) in cases {
        let app = create_test_app().await;

        let response = send(&app, upload_request(&[("document", Some(file_name), data)])).await;
        assert_eq!(response.status(), StatusCode::CREATED, "uploading {}", file_name);
        assert_eq!(json_body(response).await["detail"], "Upload was successful");

        assert_eq!(app.service.files().count().await.unwrap(), 1);
        let files = stored_files(app.root.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), data);

        let response = send(&app, get_request("/get-file/1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let record = json_body(response).await;
        assert_eq!(record["id"], 1);
        assert_eq!(record["name"], "document");
        assert_eq!(record["uploaded_by"], "Hard-coded user");
        assert!(record["date_uploaded"].is_string());

        let path = record["path"].as_str().unwrap();
        let extension = Path::new(file_name).extension().unwrap().to_str().unwrap();
        assert!(path.ends_with(&format!(".{}", extension)));
        assert_eq!(path.split('/').count(), 5);
        assert_eq!(std::fs::read(app.root.path().join(path)).unwrap(), data);
    }
}

#[tokio::test]
async fn test_multiple_fields_are_all_stored() {
    let app = create_test_app().await;

    let response = send(
        &app,
        upload_request(&[
            ("avatar", Some("me.png"), PNG),
            ("caption", None, &b"not a file"[..]),
            ("contract", Some("signed.pdf"), PDF),
            ("contract", Some("annex.pdf"), PDF),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.service.files().count().await.unwrap(), 3);
    assert_eq!(stored_files(app.root.path()).len(), 3);

    let names: Vec<String> = {
        let mut names = Vec::new();
        for id in 1..=3 {
            names.push(app.service.files().find_by_id(id).await.unwrap().name);
        }
        names
    };
    assert_eq!(names, vec!["avatar", "contract", "contract"]);
}

#[tokio::test]
async fn test_oversized_part_fails_whole_batch() {
    let app = create_test_app().await;
    let mut big = PDF.to_vec();
    big.resize(DEFAULT_MAX_UPLOAD_SIZE as usize + 1, b'0');

    let response = send(
        &app,
        upload_request(&[
            ("small", Some("small.png"), PNG),
            ("big", Some("huge.pdf"), big.as_slice()),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["detail"],
        "The uploaded file is too big: huge.pdf. Please use a file less than 10MB in size"
    );
    assert_eq!(app.service.files().count().await.unwrap(), 0);
    assert!(stored_files(app.root.path()).is_empty());
}

#[tokio::test]
async fn test_part_larger_than_form_memory_is_too_big() {
    let app = create_test_app().await;
    let mut huge = PDF.to_vec();
    huge.resize(33 * 1024 * 1024, b'0');
    assert!(huge.len() > DEFAULT_MAX_FORM_MEMORY);

    let response = send(&app, upload_request(&[("huge", Some("huge.pdf"), huge.as_slice())])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["detail"],
        "The uploaded file is too big: huge.pdf. Please use a file less than 10MB in size"
    );
    assert_eq!(app.service.files().count().await.unwrap(), 0);
    assert!(stored_files(app.root.path()).is_empty());
}

#[tokio::test]
async fn test_valid_batch_larger_than_form_memory_is_stored() {
    let app = create_test_app().await;
    let mut part = PDF.to_vec();
    part.resize(9 * 1024 * 1024, b'0');
    assert!(4 * part.len() > DEFAULT_MAX_FORM_MEMORY);

    let response = send(
        &app,
        upload_request(&[
            ("one", Some("one.pdf"), part.as_slice()),
            ("two", Some("two.pdf"), part.as_slice()),
            ("three", Some("three.pdf"), part.as_slice()),
            ("four", Some("four.pdf"), part.as_slice()),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.service.files().count().await.unwrap(), 4);
    let files = stored_files(app.root.path());
    assert_eq!(files.len(), 4);
    for path in files {
        assert_eq!(std::fs::read(path).unwrap(), part);
    }
}

#[tokio::test]
async fn test_empty_filename_is_not_a_file_part() {
    let app = create_test_app().await;

    let response = send(
        &app,
        upload_request(&[
            ("attachment", Some(""), &b""[..]),
            ("avatar", Some("me.png"), PNG),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.service.files().count().await.unwrap(), 1);
    assert_eq!(app.service.files().find_by_id(1).await.unwrap().name, "avatar");
    assert_eq!(stored_files(app.root.path()).len(), 1);
}

#[tokio::test]
async fn test_plain_text_is_rejected() {
    let app = create_test_app().await;

    let response = send(
        &app,
        upload_request(&[
            ("good", Some("good.jpg"), JPEG),
            ("notes", Some("notes.txt"), &b"meeting notes, nothing binary here\n"[..]),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["detail"],
        "The provided file format is not allowed. Please upload files in JPEG, PNG, ZIP or PDF format"
    );
    assert_eq!(app.service.files().count().await.unwrap(), 0);
    assert!(stored_files(app.root.path()).is_empty());
}

#[tokio::test]
async fn test_empty_part_is_invalid() {
    let app = create_test_app().await;

    let response = send(&app, upload_request(&[("blank", Some("blank.png"), &b""[..])])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Invalid file");
    assert_eq!(app.service.files().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_multipart_body_is_malformed() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_upload_rejects_other_methods() {
    let app = create_test_app().await;

    let response = send(&app, get_request("/upload")).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await["detail"], "Method not allowed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_get_distinct_records() {
    let app = create_test_app().await;

    let uploads: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|field| {
            let router = app.router.clone();
            let request = upload_request(&[(field, Some("same.png"), PNG)]);
            tokio::spawn(async move { router.oneshot(request).await.unwrap().status() })
        })
        .collect();
    for upload in uploads {
        assert_eq!(upload.await.unwrap(), StatusCode::CREATED);
    }

    let mut paths = Vec::new();
    for id in 1..=4 {
        paths.push(app.service.files().find_by_id(id).await.unwrap().path);
    }
    paths.sort();
    paths.dedup();
    // Leaf names come from a process-wide monotonic nanosecond counter, so
    // uploads within one process never share a path. Separate processes
    // writing the same tree could still collide on the same nanosecond.
    assert_eq!(paths.len(), 4);
    assert_eq!(stored_files(app.root.path()).len(), 4);
}

// ============================================================================
// Retrieval
// ============================================================================

#[tokio::test]
async fn test_get_unknown_file_is_not_found() {
    let app = create_test_app().await;

    let response = send(&app, get_request("/get-file/12345")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["detail"], "File does not exist");
}

#[tokio::test]
async fn test_get_non_numeric_id_is_bad_request() {
    let app = create_test_app().await;

    let response = send(&app, get_request("/get-file/abc")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Invalid file ID");
}

// ============================================================================
// Health checks
// ============================================================================

#[tokio::test]
async fn test_health_checks_report_ok() {
    let app = create_test_app().await;

    let health = send(&app, get_request("/healthz")).await;
    assert_eq!(health.status(), StatusCode::OK);

    let ready = send(&app, get_request("/readyz")).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = json_body(ready).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["database"]["ok"], true);
    assert_eq!(body["checks"]["content_root"]["ok"], true);
    // marker file cleaned up
    assert!(stored_files(app.root.path()).is_empty());
}
