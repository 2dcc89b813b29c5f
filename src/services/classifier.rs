//! Content sniffing for uploaded parts.
//!
//! Only the first [`SNIFF_LEN`] bytes are inspected. The detected type comes
//! from magic numbers, never from the client's declared content type.

use crate::errors::{IngestError, IngestResult};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Number of leading bytes consulted when sniffing.
pub const SNIFF_LEN: usize = 512;

/// MIME types accepted for storage.
pub const ALLOWED_TYPES: [&str; 4] = [
    "image/jpeg",
    "image/png",
    "application/zip",
    "application/pdf",
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Read up to [`SNIFF_LEN`] bytes from the start of `reader`.
///
/// Stops early at end of stream. The reader is left positioned after the
/// prefix; callers rewind before copying.
pub async fn read_prefix<R>(reader: &mut R) -> IngestResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|err| IngestError::CorruptUpload(err.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);

    if buf.is_empty() {
        return Err(IngestError::CorruptUpload("empty part".into()));
    }
    Ok(buf)
}

/// Detect the MIME type of `prefix`.
///
/// Unrecognised content is reported as plain text when it decodes as UTF-8
/// without binary control bytes, and as an octet stream otherwise.
pub fn sniff(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }
    if looks_like_text(prefix) {
        TEXT_PLAIN.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}

/// Sniff `prefix` and accept it only if it is on the allow-list.
pub fn classify(prefix: &[u8]) -> IngestResult<String> {
    let detected = sniff(prefix);
    if ALLOWED_TYPES.contains(&detected.as_str()) {
        Ok(detected)
    } else {
        Err(IngestError::RejectedFileType(detected))
    }
}

fn looks_like_text(prefix: &[u8]) -> bool {
    // A prefix cut mid-character is still text.
    let valid = match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    };
    valid
        && !prefix
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
}
