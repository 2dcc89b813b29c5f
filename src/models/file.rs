//! Represents the metadata row recorded for every stored upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single uploaded file as recorded in the `files` table.
///
/// The record describes where the blob lives, not the blob itself. Rows are
/// written once by the ingestion pipeline and never updated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct FileRecord {
    /// System-assigned primary key.
    pub id: i64,

    /// Multipart field key the part arrived under (not the original filename).
    pub name: String,

    /// Path relative to the content root, e.g. `2026/October/17/14/1760710000000000000.png`.
    pub path: String,

    /// Opaque uploader identity.
    pub uploaded_by: String,

    /// Set by the pipeline when the row is inserted.
    pub date_uploaded: DateTime<Utc>,
}
