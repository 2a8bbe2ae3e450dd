//! Shared data structures for multipart upload operations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rusty_multipart_common::{
    DEFAULT_PART_SIZE, DEFAULT_SHUTDOWN_GRACE_MS, DEFAULT_WORKER_COUNT, MAX_PART_SIZE,
    MIN_PART_SIZE,
};

use crate::error::UploadError;

/// Destination of an upload: bucket plus object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// S3 bucket name.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl ObjectLocation {
    /// Create a new object location.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Object attributes. The store only accepts these when the upload is initiated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// MIME type of the assembled object.
    pub content_type: Option<String>,
    /// User metadata (`x-amz-meta-*`).
    pub metadata: HashMap<String, String>,
    /// Object tags.
    pub tags: BTreeMap<String, String>,
}

impl ObjectAttributes {
    /// Create empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a user metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add an object tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Render tags as a URL-encoded query string (`k1=v1&k2=v2`), keys sorted.
    ///
    /// # Returns
    /// None when there are no tags.
    pub fn tagging(&self) -> Option<String> {
        if self.tags.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        Some(pairs.join("&"))
    }
}

/// Configuration settings for multipart uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Size of every part except the last, in bytes.
    pub part_size: u64,
    /// Maximum number of parts uploading at the same time.
    pub worker_count: usize,
    /// How long pool shutdown waits for in-flight parts before cancelling them.
    pub shutdown_grace_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl UploadSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the part size in bytes.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    /// Set the number of concurrent part uploads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Check the settings against the multipart protocol limits.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.part_size < MIN_PART_SIZE || self.part_size > MAX_PART_SIZE {
            return Err(UploadError::InvalidConfig(format!(
                "part_size must be between {} and {} bytes, got {}",
                MIN_PART_SIZE, MAX_PART_SIZE, self.part_size
            )));
        }
        if self.worker_count == 0 {
            return Err(UploadError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created; the store has not issued an upload id yet.
    Initialized,
    /// Upload id issued; parts may be submitted.
    Uploading,
    /// Final part submitted; waiting for finalize.
    Completing,
    /// The store assembled the object.
    Completed,
    /// The store-side upload was abandoned.
    Aborted,
}

impl SessionState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            SessionState::Initialized => "Initialized",
            SessionState::Uploading => "Uploading",
            SessionState::Completing => "Completing",
            SessionState::Completed => "Completed",
            SessionState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Server-side context of one multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Upload id issued by the store. None until initiated.
    pub upload_id: Option<String>,
    /// Destination of the upload.
    pub location: ObjectLocation,
    /// Current lifecycle state.
    pub state: SessionState,
}

/// A part the store accepted, as listed in the completion manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number (1..=10000).
    pub part_number: u32,
    /// Entity tag the store returned for the part.
    pub etag: String,
    /// Payload size in bytes.
    pub size: u64,
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Destination of the upload.
    pub location: ObjectLocation,
    /// Upload id the store issued.
    pub upload_id: String,
    /// Completion manifest, ascending by part number.
    pub parts: Vec<CompletedPart>,
    /// Total payload bytes across all parts.
    pub total_bytes: u64,
    /// XXH128 digest of the whole payload, when the uploader computed one.
    pub content_hash: Option<String>,
}

impl UploadSummary {
    /// Number of parts in the assembled object.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_location_display() {
        let loc = ObjectLocation::new("reports", "2024/offers.jsonl");
        assert_eq!(loc.to_string(), "s3://reports/2024/offers.jsonl");
    }

    #[test]
    fn test_tagging_sorted_and_encoded() {
        let attrs = ObjectAttributes::new()
            .with_tag("team", "growth & data")
            .with_tag("env", "prod");
        assert_eq!(
            attrs.tagging().as_deref(),
            Some("env=prod&team=growth%20%26%20data")
        );
        assert_eq!(ObjectAttributes::new().tagging(), None);
    }

    #[test]
    fn test_upload_settings_default() {
        let settings = UploadSettings::default();
        assert_eq!(settings.part_size, DEFAULT_PART_SIZE);
        assert_eq!(settings.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(settings.shutdown_grace(), Duration::from_secs(2));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_upload_settings_rejects_small_parts() {
        let settings = UploadSettings::default().with_part_size(MIN_PART_SIZE - 1);
        assert!(matches!(
            settings.validate(),
            Err(UploadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_upload_settings_rejects_zero_workers() {
        let settings = UploadSettings::default().with_worker_count(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_shutdown_grace_saturates() {
        let settings = UploadSettings::default().with_shutdown_grace(Duration::MAX);
        assert_eq!(settings.shutdown_grace_ms, u64::MAX);

        let settings = UploadSettings::default().with_shutdown_grace(Duration::from_millis(1500));
        assert_eq!(settings.shutdown_grace(), Duration::from_millis(1500));
    }

    #[test]
    fn test_upload_settings_from_partial_json() {
        let settings: UploadSettings =
            serde_json::from_str(r#"{"worker_count": 8}"#).unwrap();
        assert_eq!(settings.worker_count, 8);
        assert_eq!(settings.part_size, DEFAULT_PART_SIZE);
        assert_eq!(settings.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
    }

    #[test]
    fn test_session_state_terminal() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
        assert!(!SessionState::Completing.is_terminal());
    }
}
