//! Concurrent multipart uploads to S3-compatible object stores.
//!
//! This crate splits a payload into numbered parts, uploads them in
//! parallel through a bounded worker pool and completes or aborts the
//! upload at the store. Backends implement [`MultipartClient`]:
//!
//! - **CRT Backend** - `rusty-multipart-storage-crt`, built on the AWS SDK
//! - **Memory Backend** - [`MemoryMultipartClient`], for tests and local runs
//!
//! # Layers
//!
//! - [`ConcurrentUploadEngine`] - numbers parts at submission and runs each
//!   upload as its own task, at most `worker_count` at a time
//! - [`SessionCoordinator`] - the initiate / upload / finalize lifecycle of
//!   one object
//! - [`MultipartUploader`] - chunks a stream and drives a coordinator
//!
//! # Events
//!
//! Session and part lifecycle events are delivered to an [`UploadObserver`].
//! The default observer writes them to the `log` facade.

mod chunker;
mod engine;
mod error;
mod events;
mod memory;
mod session;
mod traits;
mod types;
mod upload;

pub use chunker::{expected_part_count, plan_parts, Chunk, ChunkInfo, Chunker};
pub use engine::{ConcurrentUploadEngine, PartResult, SessionBinding, ShutdownOutcome};
pub use error::{PartFailure, StorageError, UploadError};
pub use events::{default_observer, LogObserver, SharedObserver, UploadEvent, UploadObserver};
pub use memory::{MemoryMultipartClient, StoredObject};
pub use session::SessionCoordinator;
pub use traits::MultipartClient;
pub use types::{
    CompletedPart, ObjectAttributes, ObjectLocation, SessionState, UploadSession, UploadSettings,
    UploadSummary,
};
pub use upload::MultipartUploader;
