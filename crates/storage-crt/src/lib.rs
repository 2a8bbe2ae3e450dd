//! AWS SDK S3 backend for rusty-multipart storage.
//!
//! This crate provides a `MultipartClient` implementation using the AWS SDK
//! for Rust. Every request carries the expected bucket owner when one is
//! configured.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rusty_multipart_storage::{MultipartUploader, ObjectLocation};
//! use rusty_multipart_storage_crt::{CrtMultipartClient, StorageSettings};
//!
//! let client = CrtMultipartClient::new(StorageSettings::for_region("us-east-1")).await?;
//! let uploader = MultipartUploader::new(Arc::new(client));
//! let summary = uploader
//!     .upload_reader(ObjectLocation::new("my-bucket", "reports/offers.zip"), file)
//!     .await?;
//! ```

mod client;
mod error;
mod settings;

pub use client::CrtMultipartClient;
pub use error::CrtError;
pub use settings::{AwsCredentials, StorageSettings};
