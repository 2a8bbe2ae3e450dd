//! In-memory multipart store.
//!
//! Behaves like an S3 bucket for the four multipart calls: issues upload ids,
//! keeps parts per upload, validates the completion manifest and assembles
//! the object. Useful for local dry runs and as a test double.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use rusty_multipart_common::{etag_for, hash_bytes, MAX_PART_NUMBER, MIN_PART_NUMBER, MIN_PART_SIZE};

use crate::error::StorageError;
use crate::traits::MultipartClient;
use crate::types::{CompletedPart, ObjectAttributes, ObjectLocation};

/// An object assembled by `complete_multipart_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body, parts concatenated in part number order.
    pub data: Bytes,
    /// Attributes supplied when the upload was initiated.
    pub attributes: ObjectAttributes,
    /// Multipart entity tag (`"<digest>-<part count>"`).
    pub etag: String,
    /// Number of parts the object was assembled from.
    pub part_count: usize,
}

#[derive(Debug)]
struct StoredPart {
    etag: String,
    data: Bytes,
}

#[derive(Debug)]
struct PendingUpload {
    location: ObjectLocation,
    attributes: ObjectAttributes,
    parts: BTreeMap<u32, StoredPart>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_upload: u64,
    uploads: HashMap<String, PendingUpload>,
    objects: HashMap<ObjectLocation, StoredObject>,
    aborted: Vec<String>,
}

/// `MultipartClient` that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryMultipartClient {
    state: Mutex<MemoryState>,
    min_part_size: u64,
}

impl Default for MemoryMultipartClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMultipartClient {
    /// Create an empty store enforcing the S3 minimum part size.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            min_part_size: MIN_PART_SIZE,
        }
    }

    /// Override the minimum size enforced for every part but the last.
    pub fn with_min_part_size(mut self, min_part_size: u64) -> Self {
        self.min_part_size = min_part_size;
        self
    }

    /// Fetch a completed object.
    pub fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.lock().objects.get(location).cloned()
    }

    /// Number of uploads initiated but neither completed nor aborted.
    pub fn active_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    /// Upload ids aborted so far, in abort order.
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.lock().aborted.clone()
    }

    /// Part numbers stored for a pending upload, ascending.
    pub fn stored_parts(&self, upload_id: &str) -> Vec<u32> {
        self.lock()
            .uploads
            .get(upload_id)
            .map(|u| u.parts.keys().copied().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn no_such_upload(location: &ObjectLocation, upload_id: &str) -> StorageError {
    StorageError::NotFound {
        bucket: location.bucket.clone(),
        key: format!("{}?uploadId={}", location.key, upload_id),
    }
}

fn invalid(message: String) -> StorageError {
    StorageError::InvalidConfig { message }
}

/// Look up a pending upload and check it belongs to `location`.
fn pending_upload<'a>(
    state: &'a mut MemoryState,
    location: &ObjectLocation,
    upload_id: &str,
) -> Result<&'a mut PendingUpload, StorageError> {
    match state.uploads.get_mut(upload_id) {
        Some(upload) if upload.location == *location => Ok(upload),
        _ => Err(no_such_upload(location, upload_id)),
    }
}

#[async_trait]
impl MultipartClient for MemoryMultipartClient {
    async fn create_multipart_upload(
        &self,
        location: &ObjectLocation,
        attributes: &ObjectAttributes,
    ) -> Result<String, StorageError> {
        let mut state = self.lock();
        state.next_upload += 1;
        let upload_id: String = format!("mem-upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                location: location.clone(),
                attributes: attributes.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        part_number: u32,
        _is_last: bool,
        body: Bytes,
    ) -> Result<String, StorageError> {
        if !(MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(invalid(format!(
                "part number {} outside {}..={}",
                part_number, MIN_PART_NUMBER, MAX_PART_NUMBER
            )));
        }

        let mut state = self.lock();
        let upload: &mut PendingUpload = pending_upload(&mut state, location, upload_id)?;
        let etag: String = etag_for(&body);
        upload.parts.insert(
            part_number,
            StoredPart {
                etag: etag.clone(),
                data: body,
            },
        );
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        let upload: &mut PendingUpload = pending_upload(&mut state, location, upload_id)?;

        if parts.is_empty() {
            return Err(invalid("completion manifest lists no parts".to_string()));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(invalid(
                "completion manifest must be in ascending part number order".to_string(),
            ));
        }

        let mut body = BytesMut::new();
        let mut etags = String::new();
        for (i, part) in parts.iter().enumerate() {
            let stored: &StoredPart = upload.parts.get(&part.part_number).ok_or_else(|| {
                invalid(format!("part {} was never uploaded", part.part_number))
            })?;
            if stored.etag != part.etag {
                return Err(invalid(format!(
                    "etag mismatch for part {}: expected {}, got {}",
                    part.part_number, stored.etag, part.etag
                )));
            }
            let is_last: bool = i + 1 == parts.len();
            if !is_last && (stored.data.len() as u64) < self.min_part_size {
                return Err(invalid(format!(
                    "part {} is {} bytes, below the {} byte minimum",
                    part.part_number,
                    stored.data.len(),
                    self.min_part_size
                )));
            }
            body.extend_from_slice(&stored.data);
            etags.push_str(&stored.etag);
        }

        let object = StoredObject {
            data: body.freeze(),
            attributes: upload.attributes.clone(),
            etag: format!("\"{}-{}\"", hash_bytes(etags.as_bytes()), parts.len()),
            part_count: parts.len(),
        };
        state.uploads.remove(upload_id);
        state.objects.insert(location.clone(), object);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        pending_upload(&mut state, location, upload_id)?;
        state.uploads.remove(upload_id);
        state.aborted.push(upload_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> ObjectLocation {
        ObjectLocation::new("bucket", "object.bin")
    }

    async fn upload(client: &MemoryMultipartClient, id: &str, n: u32, data: &'static [u8]) -> CompletedPart {
        let etag = client
            .upload_part(&loc(), id, n, false, Bytes::from_static(data))
            .await
            .unwrap();
        CompletedPart {
            part_number: n,
            etag,
            size: data.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_complete_assembles_in_part_order() {
        let client = MemoryMultipartClient::new().with_min_part_size(0);
        let id = client
            .create_multipart_upload(&loc(), &ObjectAttributes::new().with_content_type("text/plain"))
            .await
            .unwrap();

        let p2 = upload(&client, &id, 2, b"world").await;
        let p1 = upload(&client, &id, 1, b"hello ").await;
        client
            .complete_multipart_upload(&loc(), &id, &[p1, p2])
            .await
            .unwrap();

        let object = client.object(&loc()).unwrap();
        assert_eq!(&object.data[..], b"hello world");
        assert_eq!(object.part_count, 2);
        assert!(object.etag.ends_with("-2\""));
        assert_eq!(object.attributes.content_type.as_deref(), Some("text/plain"));
        assert_eq!(client.active_uploads(), 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_unsorted_manifest() {
        let client = MemoryMultipartClient::new().with_min_part_size(0);
        let id = client
            .create_multipart_upload(&loc(), &ObjectAttributes::new())
            .await
            .unwrap();
        let p1 = upload(&client, &id, 1, b"a").await;
        let p2 = upload(&client, &id, 2, b"b").await;

        let err = client
            .complete_multipart_upload(&loc(), &id, &[p2, p1])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig { .. }));
        assert!(client.object(&loc()).is_none());
    }

    #[tokio::test]
    async fn test_complete_enforces_min_part_size_except_last() {
        let client = MemoryMultipartClient::new().with_min_part_size(4);
        let id = client
            .create_multipart_upload(&loc(), &ObjectAttributes::new())
            .await
            .unwrap();
        let p1 = upload(&client, &id, 1, b"ab").await;
        let p2 = upload(&client, &id, 2, b"c").await;

        assert!(client
            .complete_multipart_upload(&loc(), &id, &[p1, p2])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_part_number_out_of_range() {
        let client = MemoryMultipartClient::new();
        let id = client
            .create_multipart_upload(&loc(), &ObjectAttributes::new())
            .await
            .unwrap();

        for n in [0, MAX_PART_NUMBER + 1] {
            assert!(client
                .upload_part(&loc(), &id, n, false, Bytes::new())
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn test_abort_discards_parts() {
        let client = MemoryMultipartClient::new();
        let id = client
            .create_multipart_upload(&loc(), &ObjectAttributes::new())
            .await
            .unwrap();
        upload(&client, &id, 1, b"a").await;
        assert_eq!(client.stored_parts(&id), vec![1]);

        client.abort_multipart_upload(&loc(), &id).await.unwrap();

        assert_eq!(client.aborted_uploads(), vec![id.clone()]);
        assert!(client.stored_parts(&id).is_empty());
        assert!(matches!(
            client.abort_multipart_upload(&loc(), &id).await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
