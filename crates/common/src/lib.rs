//! Shared types and utilities for rusty-multipart.
//!
//! This crate provides common functionality used across all rusty-multipart crates:
//! - Multipart protocol limits and defaults
//! - Generic observer trait for lifecycle events
//! - Content digest functions

pub mod constants;
pub mod hash;
pub mod observer;

// Re-export commonly used items at crate root
pub use constants::*;
pub use hash::{etag_for, hash_bytes, Xxh3Hasher};
pub use observer::{observer_fn, FnObserver, NoOpObserver, Observer};
