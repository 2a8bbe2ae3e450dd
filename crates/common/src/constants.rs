//! Shared constants used across rusty-multipart crates.

/// Minimum size of every part except the last one (5MB).
/// S3 rejects the completion call with `EntityTooSmall` otherwise.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum size of a single part (5GB).
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// First valid part number.
pub const MIN_PART_NUMBER: u32 = 1;

/// Last valid part number. A session holds at most this many parts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Default part size (10MB).
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of concurrent part uploads.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default grace period for in-flight parts when the worker pool shuts down.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;
