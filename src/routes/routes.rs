//! Defines routes for the upload API.
//!
//! ## Structure
//! - `GET  /`              — greeting
//! - `POST /upload`        — multipart upload, all parts stored or none
//! - `GET  /get-file/{id}` — file record lookup
//! - `GET  /healthz`, `GET /readyz` — health checks
//!
//! Any other method on the upload and lookup paths answers 405 with a JSON
//! detail body.

use crate::{
    handlers::{
        file_handlers::{api_root, get_file, method_not_allowed, upload_files},
        health_handlers::{healthz, readyz},
    },
    services::ingest_service::IngestService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `max_request_size` caps the whole upload body; it sits
/// well above the form memory threshold since larger parts spool to disk.
pub fn routes(max_request_size: usize) -> Router<IngestService> {
    Router::new()
        .route("/", get(api_root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_files)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(max_request_size)),
        )
        .route(
            "/get-file/{id}",
            get(get_file).fallback(method_not_allowed),
        )
}
