//! Lifecycle events published by the upload engine and coordinator.

use std::sync::Arc;

use rusty_multipart_common::Observer;

use crate::types::ObjectLocation;

/// An observable step of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// The store issued an upload id.
    SessionInitiated {
        location: ObjectLocation,
        upload_id: String,
    },
    /// A part was numbered and queued for upload.
    PartSubmitted {
        part_number: u32,
        size: u64,
        is_final: bool,
    },
    /// The store accepted a part.
    PartSucceeded { part_number: u32, etag: String },
    /// A part upload failed.
    PartFailed { part_number: u32, message: String },
    /// The store assembled the object.
    SessionCompleted {
        location: ObjectLocation,
        upload_id: String,
        parts: usize,
        total_bytes: u64,
    },
    /// The session was abandoned at the store.
    SessionAborted {
        location: ObjectLocation,
        upload_id: String,
        failed_parts: Vec<u32>,
    },
}

/// Observer of upload lifecycle events.
pub trait UploadObserver: Observer<UploadEvent> {}

impl<T: Observer<UploadEvent>> UploadObserver for T {}

/// Shared observer handle passed to the engine and its worker tasks.
pub type SharedObserver = Arc<dyn UploadObserver>;

/// Observer that writes every event through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer<UploadEvent> for LogObserver {
    fn notify(&self, event: &UploadEvent) {
        match event {
            UploadEvent::SessionInitiated {
                location,
                upload_id,
            } => log::info!("Initiated multipart upload {} for {}", upload_id, location),
            UploadEvent::PartSubmitted {
                part_number,
                size,
                is_final,
            } => log::debug!(
                "Submitting part {} of {} bytes (final: {})",
                part_number,
                size,
                is_final
            ),
            UploadEvent::PartSucceeded { part_number, etag } => {
                log::debug!("Uploaded part {} with etag {}", part_number, etag)
            }
            UploadEvent::PartFailed {
                part_number,
                message,
            } => log::warn!("Part {} failed: {}", part_number, message),
            UploadEvent::SessionCompleted {
                location,
                upload_id,
                parts,
                total_bytes,
            } => log::info!(
                "Completed multipart upload {} for {}: {} parts, {} bytes",
                upload_id,
                location,
                parts,
                total_bytes
            ),
            UploadEvent::SessionAborted {
                location,
                upload_id,
                failed_parts,
            } => log::warn!(
                "Aborted multipart upload {} for {} (failed parts: {:?})",
                upload_id,
                location,
                failed_parts
            ),
        }
    }
}

/// Default observer used when none is injected.
pub fn default_observer() -> SharedObserver {
    Arc::new(LogObserver)
}
