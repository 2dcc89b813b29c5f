//! On-disk blob writes.
//!
//! Bytes are first staged into a hidden `.tmp-<uuid>` file next to their final
//! location, flushed and fsynced. The caller then either persists the staged
//! blob (hard-linked into place) or discards it. A destination path therefore only
//! ever holds a complete copy.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

/// Create `path` and any missing parents. Succeeds if it already exists,
/// including when another task created it concurrently.
pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(err),
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlobStore;

/// A fully written blob waiting to be moved into place.
#[derive(Debug)]
#[must_use = "a staged blob must be persisted or discarded"]
pub struct StagedBlob {
    tmp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self
    }

    /// Copy the remaining content of `source` into a staging file for
    /// `directory/leaf`.
    ///
    /// On error the staging file is removed and nothing is left behind.
    pub async fn write<R>(&self, directory: &Path, leaf: &str, source: &mut R) -> io::Result<StagedBlob>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let final_path = directory.join(leaf);
        let tmp_path = directory.join(format!(".tmp-{}", Uuid::new_v4()));

        match copy_to(&tmp_path, source).await {
            Ok(bytes_written) => {
                debug!("staged {} bytes for {}", bytes_written, final_path.display());
                Ok(StagedBlob {
                    tmp_path,
                    final_path,
                    bytes_written,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(err)
            }
        }
    }
}

async fn copy_to<R>(tmp_path: &Path, source: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = File::create(tmp_path).await?;
    let written = tokio::io::copy(source, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

impl StagedBlob {
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Move the staged file to its final path. Linking fails if the target
    /// exists, so an existing file is never replaced; the staged copy is
    /// removed either way.
    pub async fn persist(self) -> io::Result<PathBuf> {
        let linked = fs::hard_link(&self.tmp_path, &self.final_path).await;
        let _ = fs::remove_file(&self.tmp_path).await;
        match linked {
            Ok(()) => Ok(self.final_path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} already exists", self.final_path.display()),
            )),
            Err(err) => Err(err),
        }
    }

    /// Remove the staged file. Missing files are ignored.
    pub async fn discard(self) {
        match fs::remove_file(&self.tmp_path).await {
            Ok(()) => debug!("discarded staged blob {}", self.tmp_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => debug!(
                "failed to remove staged blob {}: {}",
                self.tmp_path.display(),
                err
            ),
        }
    }
}
