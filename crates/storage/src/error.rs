//! Error types for storage operations.

use std::fmt;

use thiserror::Error;

use crate::types::SessionState;

/// Errors reported by a `MultipartClient` for a single store call.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object or upload not found in S3.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network or service error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// The task carrying the request was cancelled before it finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid request or configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    ///
    /// The upload engine never retries on its own; this is advisory for
    /// callers that wrap a client with their own retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::IoError { .. } => false,
            StorageError::Cancelled => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Other { .. } => false,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// A part that did not upload.
#[derive(Debug, Clone)]
pub struct PartFailure {
    /// Part number the failed request carried.
    pub part_number: u32,
    /// The error that occurred.
    pub error: StorageError,
}

impl PartFailure {
    /// Create a new part failure.
    pub fn new(part_number: u32, error: StorageError) -> Self {
        Self { part_number, error }
    }
}

impl fmt::Display for PartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part {}: {}", self.part_number, self.error)
    }
}

/// Errors raised by the upload engine and session coordinator.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Operation called in the wrong lifecycle phase.
    #[error("Cannot {operation} while upload session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The store refused to start a multipart upload.
    #[error("Failed to initiate multipart upload for s3://{bucket}/{key}: {source}")]
    InitiateFailed {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    /// One or more parts failed. Every failed part is listed, ordered by part number.
    #[error("{} part(s) failed for upload {upload_id}: {}", .failures.len(), format_failures(.failures))]
    PartsFailed {
        upload_id: String,
        failures: Vec<PartFailure>,
    },

    /// The store refused the completion call.
    #[error("Failed to complete multipart upload {upload_id}: {source}")]
    CompleteFailed {
        upload_id: String,
        #[source]
        source: StorageError,
    },

    /// The worker pool no longer accepts parts.
    #[error("Upload worker pool has been shut down")]
    EngineShutDown,

    /// A part already failed; the session accepts no further parts.
    #[error("Part {failed_part} failed; no further parts are accepted for this upload")]
    SessionFailed { failed_part: u32 },

    /// A session cannot hold more parts.
    #[error("Part limit exceeded: a multipart upload holds at most {max} parts")]
    PartLimitExceeded { max: u32 },

    /// Reading the source stream failed.
    #[error("Failed to read upload source: {0}")]
    Source(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid upload configuration: {0}")]
    InvalidConfig(String),
}

impl UploadError {
    /// Part numbers of every failed part, ascending. Empty for other errors.
    pub fn failed_part_numbers(&self) -> Vec<u32> {
        match self {
            UploadError::PartsFailed { failures, .. } => {
                failures.iter().map(|f| f.part_number).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Check if this is a lifecycle state error.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidState { .. } | UploadError::EngineShutDown
        )
    }
}

fn format_failures(failures: &[PartFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<String>>()
        .join("; ")
}
