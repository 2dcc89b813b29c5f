//! A file part received in a multipart upload.
//!
//! Small parts stay in memory; once a form's buffered total passes the memory
//! threshold the rest are spooled to temporary files, removed on drop.

use bytes::Bytes;
use std::io::{self, Cursor};
use tempfile::TempPath;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncSeek},
};

/// Readable, rewindable part body.
pub trait PartSource: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T> PartSource for T where T: AsyncRead + AsyncSeek + Unpin + Send {}

pub type PartReader = Box<dyn PartSource>;

#[derive(Debug)]
pub enum PartBody {
    Memory(Bytes),
    Spooled { path: TempPath, len: u64 },
}

/// One file entry of a multipart form.
#[derive(Debug)]
pub struct UploadPart {
    /// Form field key; becomes the record's `name`.
    pub field: String,

    /// Filename declared by the client, used only for its extension.
    pub file_name: String,

    pub body: PartBody,
}

impl UploadPart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            body: PartBody::Memory(data.into()),
        }
    }

    /// Part whose `len` bytes live in the temporary file at `path`.
    pub fn spooled(field: impl Into<String>, file_name: impl Into<String>, path: TempPath, len: u64) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            body: PartBody::Spooled { path, len },
        }
    }

    /// Size of the part as received.
    pub fn size(&self) -> u64 {
        match &self.body {
            PartBody::Memory(data) => data.len() as u64,
            PartBody::Spooled { len, .. } => *len,
        }
    }

    pub fn is_spooled(&self) -> bool {
        matches!(self.body, PartBody::Spooled { .. })
    }

    /// Open the body for reading from its start.
    pub async fn open(&self) -> io::Result<PartReader> {
        match &self.body {
            PartBody::Memory(data) => Ok(Box::new(Cursor::new(data.clone()))),
            PartBody::Spooled { path, .. } => Ok(Box::new(File::open(&**path).await?)),
        }
    }
}
