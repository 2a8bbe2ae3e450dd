//! Error types for the AWS backend.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use rusty_multipart_storage::{ObjectLocation, StorageError};
use thiserror::Error;

/// Service error codes worth retrying.
const RETRYABLE_CODES: &[&str] = &[
    "InternalError",
    "RequestTimeout",
    "ServiceUnavailable",
    "SlowDown",
    "Throttling",
    "ThrottlingException",
];

/// Errors specific to the AWS storage client.
#[derive(Error, Debug)]
pub enum CrtError {
    /// AWS SDK error.
    #[error("S3 {operation} failed for s3://{bucket}/{key}: {message}")]
    SdkError {
        operation: &'static str,
        bucket: String,
        key: String,
        code: Option<String>,
        message: String,
        retryable: bool,
    },

    /// A successful response lacked a required field.
    #[error("S3 {operation} response for s3://{bucket}/{key} has no {field}")]
    MissingField {
        operation: &'static str,
        bucket: String,
        key: String,
        field: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CrtError {
    /// Classify an SDK failure.
    ///
    /// Transport failures and throttling or server-side codes are retryable.
    pub fn from_sdk<E, R>(operation: &'static str, location: &ObjectLocation, err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        let code: Option<String> = err.code().map(str::to_string);
        let transport: bool = matches!(
            err,
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
        );
        let retryable: bool = transport
            || code
                .as_deref()
                .is_some_and(|c| RETRYABLE_CODES.contains(&c));

        CrtError::SdkError {
            operation,
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            code,
            message: DisplayErrorContext(&err).to_string(),
            retryable,
        }
    }
}

impl From<CrtError> for StorageError {
    fn from(err: CrtError) -> Self {
        let message: String = err.to_string();
        match err {
            CrtError::SdkError {
                bucket,
                key,
                code,
                retryable,
                ..
            } => match code.as_deref() {
                Some("NoSuchUpload" | "NoSuchKey" | "NoSuchBucket") => {
                    StorageError::NotFound { bucket, key }
                }
                Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                    StorageError::AccessDenied {
                        bucket,
                        key,
                        message,
                    }
                }
                _ => StorageError::NetworkError { message, retryable },
            },
            CrtError::MissingField { .. } => StorageError::Other { message },
            CrtError::ConfigError(message) => StorageError::InvalidConfig { message },
        }
    }
}
