//! Streaming uploads built on the session coordinator.
//!
//! `MultipartUploader` reads a source stream one part at a time, submitting
//! each chunk to a `SessionCoordinator` as soon as it is read. Reading
//! continues while earlier parts upload; the worker pool bounds how many
//! are in flight at once.
//!
//! # Example
//!
//! ```ignore
//! use rusty_multipart_storage::{MultipartUploader, ObjectLocation, UploadSettings};
//!
//! let uploader = MultipartUploader::new(client)
//!     .with_settings(UploadSettings::default().with_worker_count(8));
//! let summary = uploader
//!     .upload_reader(ObjectLocation::new("bucket", "data.zip"), file)
//!     .await?;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;

use rusty_multipart_common::Xxh3Hasher;

use crate::chunker::{Chunk, Chunker};
use crate::error::UploadError;
use crate::events::SharedObserver;
use crate::session::SessionCoordinator;
use crate::traits::MultipartClient;
use crate::types::{ObjectAttributes, ObjectLocation, UploadSettings, UploadSummary};

/// Uploads whole streams as multipart objects.
pub struct MultipartUploader<C: ?Sized> {
    client: Arc<C>,
    settings: UploadSettings,
    attributes: ObjectAttributes,
    observer: Option<SharedObserver>,
}

impl<C> MultipartUploader<C>
where
    C: MultipartClient + ?Sized + 'static,
{
    /// Create an uploader with default settings.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            settings: UploadSettings::default(),
            attributes: ObjectAttributes::default(),
            observer: None,
        }
    }

    /// Set part size, worker count and shutdown grace period.
    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the attributes applied to every uploaded object.
    pub fn with_attributes(mut self, attributes: ObjectAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the observer for session and part events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current settings.
    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Upload everything `reader` yields to `location`.
    ///
    /// An empty source produces a single empty part. If reading the source
    /// fails the upload is aborted and the read error returned. Reading
    /// stops as soon as a part is known to have failed.
    ///
    /// # Returns
    /// The completed upload, including an XXH3-128 hash of the content.
    pub async fn upload_reader<R>(
        &self,
        location: ObjectLocation,
        reader: R,
    ) -> Result<UploadSummary, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        self.settings.validate()?;
        let part_size: usize = usize::try_from(self.settings.part_size).map_err(|_| {
            UploadError::InvalidConfig(format!(
                "part size {} does not fit in memory on this platform",
                self.settings.part_size
            ))
        })?;

        let mut session: SessionCoordinator<C> = self.coordinator(location);
        session.initiate().await?;

        let mut chunker = Chunker::new(reader, part_size);
        let mut hasher = Xxh3Hasher::new();
        loop {
            let chunk: Chunk = match chunker.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    log::warn!(
                        "Reading source for {} failed, aborting upload: {}",
                        session.location(),
                        err
                    );
                    abandon(&mut session).await;
                    return Err(UploadError::Source(err));
                }
            };

            hasher.update(&chunk.data);
            let is_final: bool = chunk.is_final;
            match submit(&mut session, chunk.data, is_final) {
                Ok(_) => {}
                // Stop reading; finalize reports every failed part and aborts.
                Err(UploadError::SessionFailed { failed_part }) => {
                    log::warn!(
                        "Part {} of {} failed, no longer reading the source",
                        failed_part,
                        session.location()
                    );
                    break;
                }
                Err(err) => {
                    abandon(&mut session).await;
                    return Err(err);
                }
            }
            if is_final {
                break;
            }
        }

        let mut summary: UploadSummary = session.finalize_upload().await?;
        summary.content_hash = Some(hasher.finish_hex());
        Ok(summary)
    }

    /// Upload an in-memory buffer to `location`.
    pub async fn upload_bytes(
        &self,
        location: ObjectLocation,
        data: impl Into<Bytes>,
    ) -> Result<UploadSummary, UploadError> {
        let data: Bytes = data.into();
        self.upload_reader(location, &data[..]).await
    }

    fn coordinator(&self, location: ObjectLocation) -> SessionCoordinator<C> {
        let session = SessionCoordinator::new(Arc::clone(&self.client), location, &self.settings)
            .with_attributes(self.attributes.clone());
        match &self.observer {
            Some(observer) => session.with_observer(Arc::clone(observer)),
            None => session,
        }
    }
}

fn submit<C>(
    session: &mut SessionCoordinator<C>,
    data: Bytes,
    is_final: bool,
) -> Result<u32, UploadError>
where
    C: MultipartClient + ?Sized + 'static,
{
    if is_final {
        session.upload_final_part(data)
    } else {
        session.upload_part(data)
    }
}

async fn abandon<C>(session: &mut SessionCoordinator<C>)
where
    C: MultipartClient + ?Sized + 'static,
{
    if let Err(err) = session.abort().await {
        log::warn!("Failed to abandon upload to {}: {}", session.location(), err);
    }
}
