//! Error types for report publishing.

use rusty_multipart_storage::UploadError;
use thiserror::Error;

/// Errors raised while rendering or publishing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A record could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The report name cannot be used as an object key segment.
    #[error("Invalid report name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The multipart upload failed.
    #[error("Failed to upload report: {0}")]
    Upload(#[from] UploadError),
}
