//! Concurrent part upload engine.
//!
//! The engine decouples *numbering* a part from *uploading* it:
//!
//! - `submit_part` assigns the next part number from an atomic counter and
//!   spawns one task per part, then returns without waiting on the network.
//! - A semaphore with `worker_count` permits bounds how many of those tasks
//!   talk to the store at once. Excess submissions wait for a permit inside
//!   their task, so the producer is never blocked.
//! - `await_all` drains every task handle, in completion order, and never
//!   stops early on a failure.
//! - Once a part has failed, `submit_part` refuses new parts. Parts already
//!   submitted still run.
//!
//! # Shutdown
//!
//! `shutdown` is two-phase: stop accepting work and wait up to the grace
//! period for outstanding tasks, then abort whatever is still running.
//! It runs at most once; later calls report `ShutdownOutcome::AlreadyShutDown`.
//! Dropping an engine that was never shut down aborts its tasks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use rusty_multipart_common::MAX_PART_NUMBER;

use crate::error::{PartFailure, StorageError, UploadError};
use crate::events::{default_observer, SharedObserver, UploadEvent};
use crate::traits::MultipartClient;
use crate::types::{CompletedPart, ObjectLocation, SessionState, UploadSettings};

/// Outcome of one part upload as collected by `await_all`.
pub type PartResult = Result<CompletedPart, PartFailure>;

/// Session the engine uploads parts into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    /// Destination bucket and key.
    pub location: ObjectLocation,
    /// Upload id issued by the store.
    pub upload_id: String,
}

/// How a worker pool shutdown went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every outstanding task finished within the grace period.
    Graceful,
    /// The grace period elapsed and the remaining tasks were aborted.
    Forced { cancelled: usize },
    /// The pool had already been shut down.
    AlreadyShutDown,
}

/// A submitted part and the handle of the task uploading it.
struct PartTask {
    part_number: u32,
    size: u64,
    handle: JoinHandle<Result<String, StorageError>>,
}

/// Mutable submission state, guarded by one lock.
#[derive(Default)]
struct Submissions {
    tasks: Vec<PartTask>,
    final_part: Option<u32>,
    shut_down: bool,
}

/// Bounded worker pool uploading the parts of one multipart session.
pub struct ConcurrentUploadEngine<C: ?Sized> {
    client: Arc<C>,
    binding: OnceLock<Arc<SessionBinding>>,
    /// Last part number issued (0 before the first submission).
    next_part_number: AtomicU32,
    /// First part number whose upload failed (0 while none has).
    first_failure: Arc<AtomicU32>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    shutdown_grace: Duration,
    submissions: Mutex<Submissions>,
    observer: SharedObserver,
}

impl<C> ConcurrentUploadEngine<C>
where
    C: MultipartClient + ?Sized + 'static,
{
    /// Create an engine.
    ///
    /// # Arguments
    /// * `client` - Store the parts are uploaded to
    /// * `worker_count` - Maximum concurrent part uploads (at least 1)
    /// * `shutdown_grace` - How long `shutdown` waits before aborting tasks
    pub fn new(client: Arc<C>, worker_count: usize, shutdown_grace: Duration) -> Self {
        let worker_count: usize = worker_count.max(1);
        Self {
            client,
            binding: OnceLock::new(),
            next_part_number: AtomicU32::new(0),
            first_failure: Arc::new(AtomicU32::new(0)),
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            shutdown_grace,
            submissions: Mutex::new(Submissions::default()),
            observer: default_observer(),
        }
    }

    /// Create an engine sized from upload settings.
    pub fn from_settings(client: Arc<C>, settings: &UploadSettings) -> Self {
        Self::new(client, settings.worker_count, settings.shutdown_grace())
    }

    /// Set the observer notified of part events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Bind the engine to an initiated session.
    ///
    /// Must be called exactly once, before the first `submit_part`.
    pub fn initialize(&self, binding: SessionBinding) -> Result<(), UploadError> {
        self.binding
            .set(Arc::new(binding))
            .map_err(|_| UploadError::InvalidState {
                operation: "initialize upload engine",
                state: SessionState::Uploading,
            })
    }

    /// Number and enqueue a part for upload.
    ///
    /// Returns as soon as the upload task is spawned. Part numbers are
    /// assigned here, in submission order, so they stay contiguous from 1
    /// no matter how many threads submit concurrently. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Arguments
    /// * `data` - Part payload
    /// * `is_final` - True for the last part; no submissions are accepted after it
    ///
    /// # Returns
    /// The part number assigned to the payload.
    pub fn submit_part(&self, data: Bytes, is_final: bool) -> Result<u32, UploadError> {
        let binding: Arc<SessionBinding> =
            self.binding
                .get()
                .cloned()
                .ok_or(UploadError::InvalidState {
                    operation: "submit part",
                    state: SessionState::Initialized,
                })?;
        let runtime: Handle = Handle::try_current().map_err(|e| {
            UploadError::InvalidConfig(format!("part uploads need a Tokio runtime: {}", e))
        })?;

        let mut submissions: MutexGuard<'_, Submissions> = self.lock_submissions();
        if submissions.shut_down {
            return Err(UploadError::EngineShutDown);
        }
        if submissions.final_part.is_some() {
            return Err(UploadError::InvalidState {
                operation: "submit part",
                state: SessionState::Completing,
            });
        }
        if let Some(failed_part) = self.failed_part() {
            return Err(UploadError::SessionFailed { failed_part });
        }
        // Increments only happen under the submissions lock, so this check
        // cannot race another submitter past the limit.
        if self.next_part_number.load(Ordering::SeqCst) >= MAX_PART_NUMBER {
            return Err(UploadError::PartLimitExceeded {
                max: MAX_PART_NUMBER,
            });
        }

        let part_number: u32 = self.next_part_number.fetch_add(1, Ordering::SeqCst) + 1;
        if is_final {
            submissions.final_part = Some(part_number);
        }

        let size: u64 = data.len() as u64;
        let client: Arc<C> = Arc::clone(&self.client);
        let workers: Arc<Semaphore> = Arc::clone(&self.workers);
        let observer: SharedObserver = Arc::clone(&self.observer);
        let first_failure: Arc<AtomicU32> = Arc::clone(&self.first_failure);

        // Events are published from the task so observers never run under
        // the submissions lock.
        let handle = runtime.spawn(async move {
            observer.notify(&UploadEvent::PartSubmitted {
                part_number,
                size,
                is_final,
            });

            // Queued submissions wait here for a free worker.
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| StorageError::Cancelled)?;

            let result: Result<String, StorageError> = client
                .upload_part(
                    &binding.location,
                    &binding.upload_id,
                    part_number,
                    is_final,
                    data,
                )
                .await;

            match &result {
                Ok(etag) => observer.notify(&UploadEvent::PartSucceeded {
                    part_number,
                    etag: etag.clone(),
                }),
                Err(err) => {
                    let _ = first_failure.compare_exchange(
                        0,
                        part_number,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                    observer.notify(&UploadEvent::PartFailed {
                        part_number,
                        message: err.to_string(),
                    });
                }
            }
            result
        });

        submissions.tasks.push(PartTask {
            part_number,
            size,
            handle,
        });
        Ok(part_number)
    }

    /// Wait for every submitted part to finish.
    ///
    /// Waits on all tasks even after one fails. Results come back in
    /// completion order; sort by part number before building a manifest.
    pub async fn await_all(&self) -> Vec<PartResult> {
        let tasks: Vec<PartTask> = std::mem::take(&mut self.lock_submissions().tasks);

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| async move {
                let PartTask {
                    part_number,
                    size,
                    handle,
                } = task;
                match handle.await {
                    Ok(Ok(etag)) => Ok(CompletedPart {
                        part_number,
                        etag,
                        size,
                    }),
                    Ok(Err(error)) => Err(PartFailure::new(part_number, error)),
                    Err(join_error) => Err(PartFailure::new(part_number, join_failure(join_error))),
                }
            })
            .collect();

        let mut results: Vec<PartResult> = Vec::with_capacity(pending.len());
        while let Some(result) = pending.next().await {
            results.push(result);
        }
        results
    }

    /// Shut the worker pool down.
    ///
    /// Stops accepting submissions, waits up to the grace period for
    /// outstanding tasks, then aborts the rest. Failing to drain in time is
    /// logged, not returned as an error. Safe to call more than once.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let mut tasks: Vec<PartTask> = {
            let mut submissions: MutexGuard<'_, Submissions> = self.lock_submissions();
            if submissions.shut_down {
                return ShutdownOutcome::AlreadyShutDown;
            }
            submissions.shut_down = true;
            std::mem::take(&mut submissions.tasks)
        };

        let drained: bool = tasks.is_empty()
            || tokio::time::timeout(
                self.shutdown_grace,
                futures::future::join_all(tasks.iter_mut().map(|t| &mut t.handle)),
            )
            .await
            .is_ok();

        if drained {
            self.workers.close();
            log::debug!("Upload worker pool shut down");
            return ShutdownOutcome::Graceful;
        }

        let mut cancelled: usize = 0;
        for task in &tasks {
            if !task.handle.is_finished() {
                task.handle.abort();
                cancelled += 1;
            }
        }
        self.workers.close();
        log::warn!(
            "Upload worker pool did not drain within {:?}; cancelled {} part upload(s)",
            self.shutdown_grace,
            cancelled
        );
        ShutdownOutcome::Forced { cancelled }
    }

    /// Number of part numbers issued so far.
    pub fn submitted_parts(&self) -> u32 {
        self.next_part_number.load(Ordering::SeqCst)
    }

    /// First part known to have failed, if any.
    pub fn failed_part(&self) -> Option<u32> {
        match self.first_failure.load(Ordering::SeqCst) {
            0 => None,
            part_number => Some(part_number),
        }
    }

    /// Part number of the final part, once submitted.
    pub fn final_part(&self) -> Option<u32> {
        self.lock_submissions().final_part
    }

    /// Maximum concurrent part uploads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Session the engine is bound to, if initialized.
    pub fn binding(&self) -> Option<&SessionBinding> {
        self.binding.get().map(|b| b.as_ref())
    }

    /// Check if `shutdown` has run.
    pub fn is_shut_down(&self) -> bool {
        self.lock_submissions().shut_down
    }

    fn lock_submissions(&self) -> MutexGuard<'_, Submissions> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: ?Sized> Drop for ConcurrentUploadEngine<C> {
    fn drop(&mut self) {
        let submissions: &mut Submissions = self
            .submissions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for task in &submissions.tasks {
            task.handle.abort();
        }
        self.workers.close();
    }
}

fn join_failure(err: JoinError) -> StorageError {
    if err.is_cancelled() {
        StorageError::Cancelled
    } else {
        StorageError::Other {
            message: format!("part upload task panicked: {}", err),
        }
    }
}
