//! HTTP upload ingestion: multipart parts are sniffed, written into an
//! hour-bucketed content tree and recorded in SQLite, one transaction per
//! request.

use axum::Router;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use services::ingest_service::IngestService;

/// Assemble the full application router around `service`.
pub fn app(service: IngestService, max_request_size: usize) -> Router {
    routes::routes::routes(max_request_size).with_state(service)
}
