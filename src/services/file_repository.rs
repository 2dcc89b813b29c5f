//! Metadata persistence for stored uploads.

use crate::{
    errors::{IngestError, IngestResult},
    models::file::FileRecord,
};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(250) NOT NULL,
    path VARCHAR NOT NULL,
    uploaded_by VARCHAR(250) NOT NULL,
    date_uploaded DATETIME NOT NULL
)
"#;

#[derive(Clone)]
pub struct FileRepository {
    db: Arc<SqlitePool>,
}

impl FileRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create the `files` table if it does not exist yet.
    pub async fn create_table(&self) -> Result<(), sqlx::Error> {
        tracing::info!("ensuring files table exists");
        sqlx::query(CREATE_FILES_TABLE).execute(&*self.db).await?;
        Ok(())
    }

    /// Insert a record inside `tx` and return its id. Does not commit.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
        path: &str,
        uploaded_by: &str,
    ) -> IngestResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO files (name, path, uploaded_by, date_uploaded)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(name)
        .bind(path)
        .bind(uploaded_by)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    pub async fn find_by_id(&self, id: i64) -> IngestResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, name, path, uploaded_by, date_uploaded FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => IngestError::NotFound(id),
            other => IngestError::Query(other),
        })
    }

    pub async fn count(&self) -> IngestResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }
}
