//! HTTP handlers for uploading and looking up files.
//! Upload parsing and storage are delegated to `IngestService`.

use crate::{
    errors::{AppError, IngestError},
    models::file::FileRecord,
    services::ingest_service::IngestService,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `GET /` — greeting.
pub async fn api_root() -> &'static str {
    "Welcome to our API Root!"
}

/// `POST /upload` — store every file part of a multipart form.
///
/// All parts are stored or none are. Returns 201 with a generic
/// acknowledgment; stored paths are not echoed back.
pub async fn upload_files(
    State(service): State<IngestService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let multipart = multipart.map_err(|err| IngestError::MalformedRequest(err.body_text()))?;
    let parts = service.collect_parts(multipart).await?;
    tracing::debug!("received {} file part(s)", parts.len());

    service.ingest(&parts, &service.uploaded_by).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "detail": "Upload was successful" })),
    ))
}

/// `GET /get-file/{id}` — fetch one file record.
pub async fn get_file(
    State(service): State<IngestService>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let record = service.find_file(&id).await?;
    Ok(Json(record))
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}
