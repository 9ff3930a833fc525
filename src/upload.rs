#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Request-scoped staging of uploaded files.

use axum::extract::multipart::{Field, MultipartError};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};

/// Why an upload could not be staged.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload grew past the configured size limit.
    #[error("file exceeds the limit of {limit} bytes (received at least {received})")]
    TooLarge {
        /// Limit in bytes.
        limit:    u64,
        /// Bytes received when the limit was crossed.
        received: u64,
    },
    /// The temp file could not be written or read.
    #[error("could not stage upload: {0}")]
    Io(#[from] std::io::Error),
    /// The multipart stream broke off or was rejected by the body limit.
    #[error("could not read upload: {0}")]
    Multipart(#[from] MultipartError),
}

/// An upload written to a temporary file that is removed on drop.
///
/// The file is deleted on success, on every error path, and when the owning
/// request is cancelled.
pub struct StagedUpload {
    /// Backing temp file; deleted when dropped.
    file:    NamedTempFile,
    /// Async handle used for writing.
    writer:  File,
    /// Bytes written so far.
    written: u64,
    /// Maximum number of bytes accepted.
    limit:   u64,
}

impl StagedUpload {
    /// Creates an empty staged file whose name ends with the extension of
    /// `file_name`, accepting at most `limit` bytes.
    pub fn create(file_name: &str, limit: u64) -> Result<Self, UploadError> {
        let suffix = crate::types::file_extension(file_name).unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("veritas-")
            .suffix(&suffix)
            .tempfile()?;
        let writer = File::from_std(file.reopen()?);
        Ok(Self {
            file,
            writer,
            written: 0,
            limit,
        })
    }

    /// Streams `field` to disk chunk by chunk, failing as soon as more than
    /// `limit` bytes arrive.
    pub async fn stage(mut field: Field<'_>, limit: u64) -> Result<Self, UploadError> {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mut staged = Self::create(&file_name, limit)?;
        while let Some(chunk) = field.chunk().await? {
            staged.append(&chunk).await?;
        }
        staged.writer.flush().await?;
        tracing::debug!(
            file = %file_name,
            size = %format_size(staged.written),
            path = %staged.path().display(),
            "staged upload"
        );
        Ok(staged)
    }

    /// Appends `chunk`, enforcing the size limit before writing.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let received = self.written + chunk.len() as u64;
        if received > self.limit {
            return Err(UploadError::TooLarge {
                limit: self.limit,
                received,
            });
        }
        self.writer.write_all(chunk).await?;
        self.written = received;
        Ok(())
    }

    /// Number of bytes staged.
    pub fn len(&self) -> u64 {
        self.written
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Location of the staged file.
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Reads the staged bytes back.
    pub async fn read(&mut self) -> Result<Vec<u8>, UploadError> {
        self.writer.flush().await?;
        Ok(tokio::fs::read(self.file.path()).await?)
    }
}

/// Formats a byte count with one decimal, eg. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
