//! src/services/ingest_service.rs
//!
//! IngestService — turns a multipart upload into stored blobs plus metadata
//! rows, all-or-nothing per request.
//!
//! Per request: collect the form's file parts (buffered in memory up to the
//! form memory threshold, spooled to temporary files past it), open one transaction, then for each part
//! validate (size, sniffed type), allocate a path, stage the bytes and insert
//! the row. Any failure rolls the transaction back and discards every blob
//! staged so far. After a successful commit the staged blobs are moved into
//! their final location.

use crate::{
    config::DEFAULT_MAX_FORM_MEMORY,
    errors::{IngestError, IngestResult},
    models::{file::FileRecord, upload::UploadPart},
    services::{
        blob_store::{BlobStore, StagedBlob},
        classifier,
        file_repository::FileRepository,
        path_allocator::PathAllocator,
    },
};
use axum::extract::{Multipart, multipart::MultipartError};
use bytes::BytesMut;
use chrono::Local;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::{path::PathBuf, sync::Arc};
use tempfile::{NamedTempFile, TempPath};
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, error, info, warn};

/// Shared state behind every route: pool, content root and pipeline stages.
#[derive(Clone)]
pub struct IngestService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory under which hour buckets are created.
    pub content_root: PathBuf,

    /// Largest accepted part, in bytes.
    pub max_upload_size: u64,

    /// Identity recorded on every row.
    pub uploaded_by: String,

    /// Bytes of file parts one form may hold in memory before spooling.
    pub max_form_memory: usize,

    allocator: PathAllocator,
    blobs: BlobStore,
    files: FileRepository,
}

impl IngestService {
    pub fn new(
        db: Arc<SqlitePool>,
        content_root: impl Into<PathBuf>,
        max_upload_size: u64,
        uploaded_by: impl Into<String>,
    ) -> Self {
        let content_root = content_root.into();
        Self {
            files: FileRepository::new(db.clone()),
            allocator: PathAllocator::new(content_root.clone()),
            blobs: BlobStore::new(),
            db,
            content_root,
            max_upload_size,
            uploaded_by: uploaded_by.into(),
            max_form_memory: DEFAULT_MAX_FORM_MEMORY,
        }
    }

    pub fn with_form_memory(mut self, bytes: usize) -> Self {
        self.max_form_memory = bytes;
        self
    }

    pub fn files(&self) -> &FileRepository {
        &self.files
    }

    /// Look up a stored record by the raw id taken from a request path.
    pub async fn find_file(&self, raw_id: &str) -> IngestResult<FileRecord> {
        let id = raw_id
            .parse::<i64>()
            .map_err(|_| IngestError::InvalidIdentifier(raw_id.to_string()))?;
        self.files.find_by_id(id).await
    }

    /// Store every part of one batch under a single transaction and return
    /// the new record ids in part order.
    pub async fn ingest(&self, parts: &[UploadPart], uploaded_by: &str) -> IngestResult<Vec<i64>> {
        let mut tx = self.db.begin().await?;
        let mut staged: Vec<StagedBlob> = Vec::with_capacity(parts.len());
        let mut ids = Vec::with_capacity(parts.len());

        for part in parts {
            match self.ingest_part(&mut tx, part, uploaded_by).await {
                Ok((id, blob)) => {
                    ids.push(id);
                    staged.push(blob);
                }
                Err(err) => {
                    warn!(
                        "rejecting batch at part `{}` ({}): {}",
                        part.field, part.file_name, err
                    );
                    if let Err(rb) = tx.rollback().await {
                        error!("rollback failed: {}", rb);
                    }
                    discard_all(staged).await;
                    return Err(err);
                }
            }
        }

        debug!("committing {} file record(s)", ids.len());
        if let Err(err) = tx.commit().await {
            error!("commit failed for batch of {}: {}", ids.len(), err);
            discard_all(staged).await;
            return Err(IngestError::Query(err));
        }

        // Rows are durable now; a failed rename leaves a record without its
        // blob, so report it rather than carry on.
        let mut persist_error = None;
        for blob in staged {
            let target = blob.final_path().to_path_buf();
            if let Err(err) = blob.persist().await {
                error!(
                    "committed record has no blob at {}: {}",
                    target.display(),
                    err
                );
                if persist_error.is_none() {
                    persist_error = Some(err);
                }
            }
        }
        if let Some(err) = persist_error {
            return Err(IngestError::Io(err));
        }

        info!("stored {} file(s): ids {:?}", ids.len(), ids);
        Ok(ids)
    }

    /// Validate, stage and record one part. On error nothing staged by this
    /// part is left behind.
    async fn ingest_part(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        part: &UploadPart,
        uploaded_by: &str,
    ) -> IngestResult<(i64, StagedBlob)> {
        let size = part.size();
        if size > self.max_upload_size {
            return Err(IngestError::PayloadTooLarge {
                file_name: part.file_name.clone(),
                size,
                limit: self.max_upload_size,
            });
        }

        let mut reader = part.open().await?;
        let prefix = classifier::read_prefix(&mut reader).await?;
        let mime = classifier::classify(&prefix)?;
        reader
            .seek(std::io::SeekFrom::Start(0))
            .await
            .map_err(|err| IngestError::CorruptUpload(err.to_string()))?;
        debug!("part `{}` sniffed as {}", part.field, mime);

        let allocation = self.allocator.allocate(Local::now(), &part.file_name).await?;
        let blob = self
            .blobs
            .write(&allocation.directory, &allocation.leaf, &mut reader)
            .await?;
        if blob.bytes_written() != size {
            let written = blob.bytes_written();
            blob.discard().await;
            return Err(IngestError::Io(std::io::Error::other(format!(
                "short write for `{}`: {} of {} bytes",
                part.field, written, size
            ))));
        }

        match self
            .files
            .insert(tx, &part.field, &allocation.relative_path, uploaded_by)
            .await
        {
            Ok(id) => {
                debug!("part `{}` recorded as {} at {}", part.field, id, allocation.relative_path);
                Ok((id, blob))
            }
            Err(err) => {
                blob.discard().await;
                Err(err)
            }
        }
    }

    /// Read every file part of a multipart body, in encounter order.
    ///
    /// Fields without a filename (or with an empty one) are plain form values
    /// and are skipped. A part stops being read as soon as it passes
    /// `max_upload_size`. Parts are kept in memory until the form's buffered
    /// total would pass `max_form_memory`; from then on they go to temporary
    /// files.
    pub async fn collect_parts(&self, mut multipart: Multipart) -> IngestResult<Vec<UploadPart>> {
        let mut parts = Vec::new();
        let mut buffered = 0usize;

        while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
            let file_name = match field.file_name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };
            let key = field.name().unwrap_or_default().to_string();

            let mut size = 0u64;
            let mut buffer = BytesMut::new();
            let mut spool: Option<(File, TempPath)> = None;

            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                size += chunk.len() as u64;
                if size > self.max_upload_size {
                    warn!("part `{}` ({}) passed {} bytes", key, file_name, self.max_upload_size);
                    return Err(IngestError::PayloadTooLarge {
                        file_name,
                        size,
                        limit: self.max_upload_size,
                    });
                }

                match spool.as_mut() {
                    Some((file, _)) => file.write_all(&chunk).await?,
                    None if buffered + buffer.len() + chunk.len() <= self.max_form_memory => {
                        buffer.extend_from_slice(&chunk)
                    }
                    None => {
                        let (file, path) = NamedTempFile::new()?.into_parts();
                        let mut file = File::from_std(file);
                        file.write_all(&buffer).await?;
                        file.write_all(&chunk).await?;
                        buffer.clear();
                        spool = Some((file, path));
                    }
                }
            }

            match spool {
                Some((mut file, path)) => {
                    file.flush().await?;
                    debug!("part `{}` spooled to {} ({} bytes)", key, path.display(), size);
                    parts.push(UploadPart::spooled(key, file_name, path, size));
                }
                None => {
                    buffered += buffer.len();
                    parts.push(UploadPart::new(key, file_name, buffer.freeze()));
                }
            }
        }
        Ok(parts)
    }
}

fn malformed(err: MultipartError) -> IngestError {
    IngestError::MalformedRequest(err.body_text())
}

async fn discard_all(staged: Vec<StagedBlob>) {
    for blob in staged {
        blob.discard().await;
    }
}
