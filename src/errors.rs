use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Detail returned for storage and database failures; internals stay in the logs.
const OUTAGE_DETAIL: &str = "We are working to resolve our API outage";

/// Every way an upload or lookup can fail.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed multipart body: {0}")]
    MalformedRequest(String),
    #[error("part `{file_name}` is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },
    #[error("file type `{0}` is not allowed")]
    RejectedFileType(String),
    #[error("upload is unreadable: {0}")]
    CorruptUpload(String),
    #[error("storage failure: {0}")]
    Io(#[from] io::Error),
    #[error("query failure: {0}")]
    Query(#[from] sqlx::Error),
    #[error("file {0} not found")]
    NotFound(i64),
    #[error("`{0}` is not a valid file id")]
    InvalidIdentifier(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 405 Method Not Allowed
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.message }));

        (self.status, body).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MalformedRequest(msg) => AppError::bad_request(msg),
            IngestError::PayloadTooLarge {
                file_name, limit, ..
            } => AppError::bad_request(format!(
                "The uploaded file is too big: {}. Please use a file less than {} in size",
                file_name,
                human_size(limit)
            )),
            IngestError::RejectedFileType(_) => AppError::bad_request(
                "The provided file format is not allowed. Please upload files in JPEG, PNG, ZIP or PDF format",
            ),
            IngestError::CorruptUpload(_) => AppError::bad_request("Invalid file"),
            IngestError::Io(_) | IngestError::Query(_) => AppError::bad_request(OUTAGE_DETAIL),
            IngestError::NotFound(_) => AppError::not_found("File does not exist"),
            IngestError::InvalidIdentifier(_) => AppError::bad_request("Invalid file ID"),
        }
    }
}

/// Render a byte count in the largest unit that divides it exactly.
fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    match bytes {
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{} bytes", b),
    }
}
