//! Multipart session coordination.
//!
//! `SessionCoordinator` drives the three-phase protocol for one object:
//!
//! ```text
//! Initialized --initiate--> Uploading --upload_final_part--> Completing
//!                               |                                |
//!                               +--abort--+          finalize_upload
//!                                         v                      |
//!                                      Aborted <--part/complete--+--> Completed
//!                                                 failure
//! ```
//!
//! Parts are fanned out to a `ConcurrentUploadEngine`; `finalize_upload`
//! fans the results back in, orders them by part number and either completes
//! or aborts the upload at the store. The worker pool is shut down on every
//! path out of `finalize_upload` and `abort`.

use std::sync::Arc;

use bytes::Bytes;

use crate::engine::{ConcurrentUploadEngine, PartResult, SessionBinding};
use crate::error::{PartFailure, UploadError};
use crate::events::{default_observer, SharedObserver, UploadEvent};
use crate::traits::MultipartClient;
use crate::types::{
    CompletedPart, ObjectAttributes, ObjectLocation, SessionState, UploadSession, UploadSettings,
    UploadSummary,
};

/// Coordinates one multipart upload session.
pub struct SessionCoordinator<C: ?Sized> {
    client: Arc<C>,
    location: ObjectLocation,
    attributes: ObjectAttributes,
    engine: ConcurrentUploadEngine<C>,
    state: SessionState,
    upload_id: Option<String>,
    observer: SharedObserver,
}

impl<C> SessionCoordinator<C>
where
    C: MultipartClient + ?Sized + 'static,
{
    /// Create a coordinator for one destination.
    ///
    /// # Arguments
    /// * `client` - Store to upload to
    /// * `location` - Destination bucket and key
    /// * `settings` - Worker pool sizing and shutdown grace period
    pub fn new(client: Arc<C>, location: ObjectLocation, settings: &UploadSettings) -> Self {
        let observer: SharedObserver = default_observer();
        let engine = ConcurrentUploadEngine::from_settings(Arc::clone(&client), settings)
            .with_observer(Arc::clone(&observer));
        Self {
            client,
            location,
            attributes: ObjectAttributes::default(),
            engine,
            state: SessionState::Initialized,
            upload_id: None,
            observer,
        }
    }

    /// Set the attributes sent with the initiate call.
    pub fn with_attributes(mut self, attributes: ObjectAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the observer for session and part events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.engine = self.engine.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    /// Start the upload at the store.
    ///
    /// On failure the coordinator stays `Initialized` and no parts can be
    /// submitted.
    ///
    /// # Returns
    /// The upload id issued by the store.
    pub async fn initiate(&mut self) -> Result<&str, UploadError> {
        self.require(SessionState::Initialized, "initiate upload")?;

        let upload_id: String = self
            .client
            .create_multipart_upload(&self.location, &self.attributes)
            .await
            .map_err(|source| UploadError::InitiateFailed {
                bucket: self.location.bucket.clone(),
                key: self.location.key.clone(),
                source,
            })?;

        self.engine.initialize(SessionBinding {
            location: self.location.clone(),
            upload_id: upload_id.clone(),
        })?;
        self.state = SessionState::Uploading;
        self.observer.notify(&UploadEvent::SessionInitiated {
            location: self.location.clone(),
            upload_id: upload_id.clone(),
        });

        Ok(self.upload_id.insert(upload_id).as_str())
    }

    /// Queue a non-final part.
    ///
    /// Once a part has failed this returns `UploadError::SessionFailed` and
    /// the session moves to `Completing`; call `finalize_upload` to collect
    /// every failure and abort at the store.
    ///
    /// # Returns
    /// The part number assigned to the payload.
    pub fn upload_part(&mut self, data: Bytes) -> Result<u32, UploadError> {
        self.require(SessionState::Uploading, "upload part")?;
        let submitted: Result<u32, UploadError> = self.engine.submit_part(data, false);
        if let Err(err) = &submitted {
            self.stop_on_failure(err);
        }
        submitted
    }

    /// Queue the final part. No parts are accepted afterwards.
    ///
    /// # Returns
    /// The part number assigned to the payload.
    pub fn upload_final_part(&mut self, data: Bytes) -> Result<u32, UploadError> {
        self.require(SessionState::Uploading, "upload final part")?;
        let submitted: Result<u32, UploadError> = self.engine.submit_part(data, true);
        if let Err(err) = &submitted {
            self.stop_on_failure(err);
        }
        let part_number: u32 = submitted?;
        self.state = SessionState::Completing;
        Ok(part_number)
    }

    /// Wait for every part, then complete the upload or abort it.
    ///
    /// If any part failed the upload is aborted at the store and the error
    /// lists every failed part. The worker pool is shut down either way.
    pub async fn finalize_upload(&mut self) -> Result<UploadSummary, UploadError> {
        self.require(SessionState::Completing, "finalize upload")?;
        let upload_id: String = self.upload_id.clone().ok_or(UploadError::InvalidState {
            operation: "finalize upload",
            state: SessionState::Initialized,
        })?;

        let outcome: Result<UploadSummary, UploadError> = self.collect_and_complete(upload_id).await;
        self.engine.shutdown().await;
        outcome
    }

    /// Abandon the session.
    ///
    /// Shuts the worker pool down (letting in-flight parts finish within the
    /// grace period), then aborts the upload at the store if one was
    /// initiated.
    pub async fn abort(&mut self) -> Result<(), UploadError> {
        if self.state.is_terminal() {
            return Err(UploadError::InvalidState {
                operation: "abort upload",
                state: self.state,
            });
        }

        self.engine.shutdown().await;
        if let Some(upload_id) = self.upload_id.clone() {
            self.abort_at_store(&upload_id, Vec::new()).await;
        }
        self.state = SessionState::Aborted;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Upload id, once initiated.
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Destination of the upload.
    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    /// Snapshot of the session record.
    pub fn session(&self) -> UploadSession {
        UploadSession {
            upload_id: self.upload_id.clone(),
            location: self.location.clone(),
            state: self.state,
        }
    }

    /// The worker pool uploading this session's parts.
    pub fn engine(&self) -> &ConcurrentUploadEngine<C> {
        &self.engine
    }

    async fn collect_and_complete(&mut self, upload_id: String) -> Result<UploadSummary, UploadError> {
        let results: Vec<PartResult> = self.engine.await_all().await;

        let mut parts: Vec<CompletedPart> = Vec::with_capacity(results.len());
        let mut failures: Vec<PartFailure> = Vec::new();
        for result in results {
            match result {
                Ok(part) => parts.push(part),
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.part_number);
            let failed_parts: Vec<u32> = failures.iter().map(|f| f.part_number).collect();
            self.abort_at_store(&upload_id, failed_parts).await;
            self.state = SessionState::Aborted;
            return Err(UploadError::PartsFailed {
                upload_id,
                failures,
            });
        }

        // Completion order is arbitrary; the manifest must not be.
        parts.sort_by_key(|p| p.part_number);

        if let Err(source) = self
            .client
            .complete_multipart_upload(&self.location, &upload_id, &parts)
            .await
        {
            self.abort_at_store(&upload_id, Vec::new()).await;
            self.state = SessionState::Aborted;
            return Err(UploadError::CompleteFailed { upload_id, source });
        }

        self.state = SessionState::Completed;
        let total_bytes: u64 = parts.iter().map(|p| p.size).sum();
        self.observer.notify(&UploadEvent::SessionCompleted {
            location: self.location.clone(),
            upload_id: upload_id.clone(),
            parts: parts.len(),
            total_bytes,
        });

        Ok(UploadSummary {
            location: self.location.clone(),
            upload_id,
            parts,
            total_bytes,
            content_hash: None,
        })
    }

    /// Release the store-side session. Failures are logged, not returned.
    async fn abort_at_store(&self, upload_id: &str, failed_parts: Vec<u32>) {
        if let Err(err) = self
            .client
            .abort_multipart_upload(&self.location, upload_id)
            .await
        {
            log::warn!(
                "Failed to abort multipart upload {} for {}: {}",
                upload_id,
                self.location,
                err
            );
        }
        self.observer.notify(&UploadEvent::SessionAborted {
            location: self.location.clone(),
            upload_id: upload_id.to_string(),
            failed_parts,
        });
    }

    fn stop_on_failure(&mut self, err: &UploadError) {
        if matches!(err, UploadError::SessionFailed { .. }) {
            self.state = SessionState::Completing;
        }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), UploadError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(UploadError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
