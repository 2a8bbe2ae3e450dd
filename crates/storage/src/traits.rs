//! Storage traits/interfaces for multipart upload operations.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;
use crate::types::{CompletedPart, ObjectAttributes, ObjectLocation};

/// Low-level multipart upload operations - implemented by each backend.
///
/// Transport, authentication and retry belong to the implementation.
/// The upload engine calls each method at most once per request.
#[async_trait]
pub trait MultipartClient: Send + Sync {
    /// Start a multipart upload.
    ///
    /// # Arguments
    /// * `location` - Destination bucket and key
    /// * `attributes` - Content type, metadata and tags for the final object
    ///
    /// # Returns
    /// The upload id that identifies the session in later calls.
    async fn create_multipart_upload(
        &self,
        location: &ObjectLocation,
        attributes: &ObjectAttributes,
    ) -> Result<String, StorageError>;

    /// Upload one part.
    ///
    /// # Arguments
    /// * `location` - Destination bucket and key
    /// * `upload_id` - Session issued by `create_multipart_upload`
    /// * `part_number` - Part number in `1..=10000`
    /// * `is_last` - True for the final part of the session
    /// * `body` - Part payload
    ///
    /// # Returns
    /// The entity tag the store assigned to the part.
    async fn upload_part(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        part_number: u32,
        is_last: bool,
        body: Bytes,
    ) -> Result<String, StorageError>;

    /// Assemble the object from uploaded parts.
    ///
    /// # Arguments
    /// * `location` - Destination bucket and key
    /// * `upload_id` - Session to complete
    /// * `parts` - Completion manifest, ascending by part number
    async fn complete_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError>;

    /// Abandon a multipart upload and release the parts stored so far.
    ///
    /// # Arguments
    /// * `location` - Destination bucket and key
    /// * `upload_id` - Session to abort
    async fn abort_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
    ) -> Result<(), StorageError>;
}
