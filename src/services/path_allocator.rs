//! Time-bucketed storage paths.
//!
//! Uploads land under `<root>/<year>/<month>/<day>/<hour>/<nanos><ext>`, so a
//! single directory only ever receives one hour of traffic.

use crate::services::blob_store;
use chrono::{DateTime, Datelike, TimeZone, Timelike};
use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

/// Where one part will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Absolute hour-bucket directory; exists once allocation returns.
    pub directory: PathBuf,
    /// Generated leaf name including the original extension.
    pub leaf: String,
    /// `<year>/<month>/<day>/<hour>/<leaf>`, relative to the content root.
    pub relative_path: String,
}

#[derive(Clone, Debug)]
pub struct PathAllocator {
    root: PathBuf,
    last_nanos: Arc<AtomicI64>,
}

impl PathAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_nanos: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Derive the directory and leaf name for a part uploaded at `now`,
    /// creating the directory if needed.
    pub async fn allocate<Tz>(&self, now: DateTime<Tz>, file_name: &str) -> io::Result<Allocation>
    where
        Tz: TimeZone,
    {
        let bucket = hour_bucket(&now);
        let directory = self.root.join(&bucket);
        blob_store::ensure_dir(&directory).await?;

        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1_000);
        let leaf = format!("{}{}", self.next_nanos(nanos), extension(file_name));
        let relative_path = format!("{}/{}", bucket, leaf);

        Ok(Allocation {
            directory,
            leaf,
            relative_path,
        })
    }

    /// Return `candidate`, or one past the last issued value if the clock has
    /// not moved forward since.
    fn next_nanos(&self, candidate: i64) -> i64 {
        let mut last = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self.last_nanos.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

/// `2026/October/17/9` style bucket for `at`.
fn hour_bucket<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let month = chrono::Month::try_from(at.month() as u8)
        .map(|m| m.name())
        .unwrap_or("Unknown");
    format!("{}/{}/{}/{}", at.year(), month, at.day(), at.hour())
}

/// Extension of `file_name` including its dot, or empty.
fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
