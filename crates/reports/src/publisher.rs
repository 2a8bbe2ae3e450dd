//! Publishing rendered reports as multipart objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusty_multipart_storage::{
    MultipartClient, MultipartUploader, ObjectAttributes, ObjectLocation, SharedObserver,
    UploadSettings, UploadSummary,
};

use crate::error::ReportError;
use crate::report::{render_report, OfferReport, ReportFormat};

/// Result of publishing one named report.
#[derive(Debug)]
pub struct PublishOutcome {
    /// Report name as given by the caller.
    pub name: String,
    /// Destination object.
    pub location: ObjectLocation,
    /// Upload summary, or why the report was not published.
    pub result: Result<UploadSummary, ReportError>,
}

impl PublishOutcome {
    /// Check if the report was stored.
    pub fn is_published(&self) -> bool {
        self.result.is_ok()
    }
}

/// Uploads offer reports under a common bucket and key prefix.
pub struct ReportPublisher<C: ?Sized> {
    client: Arc<C>,
    bucket: String,
    prefix: String,
    format: ReportFormat,
    settings: UploadSettings,
    tags: BTreeMap<String, String>,
    observer: Option<SharedObserver>,
}

impl<C> ReportPublisher<C>
where
    C: MultipartClient + ?Sized + 'static,
{
    /// Create a publisher writing JSON Lines reports.
    ///
    /// # Arguments
    /// * `client` - Store to upload to
    /// * `bucket` - Destination bucket
    /// * `prefix` - Key prefix; leading and trailing slashes are ignored
    pub fn new(client: Arc<C>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            format: ReportFormat::default(),
            settings: UploadSettings::default(),
            tags: BTreeMap::new(),
            observer: None,
        }
    }

    /// Set the report format.
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Set upload settings.
    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add an object tag applied to every report.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the observer for upload events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Object location a report name maps to.
    pub fn location_for(&self, name: &str) -> Result<ObjectLocation, ReportError> {
        validate_name(name)?;
        let file: String = format!("{}.{}", name, self.format.extension());
        let key: String = if self.prefix.is_empty() {
            file
        } else {
            format!("{}/{}", self.prefix, file)
        };
        Ok(ObjectLocation::new(self.bucket.clone(), key))
    }

    /// Render and upload one report.
    pub async fn publish_one(
        &self,
        name: &str,
        records: &[OfferReport],
    ) -> Result<UploadSummary, ReportError> {
        let location: ObjectLocation = self.location_for(name)?;
        let body: Vec<u8> = render_report(records, self.format)?;
        let summary: UploadSummary = self.uploader().upload_bytes(location, body).await?;
        Ok(summary)
    }

    /// Upload every report, one multipart session each.
    ///
    /// A failed report does not stop the others.
    ///
    /// # Returns
    /// One outcome per report, in name order.
    pub async fn publish_all(
        &self,
        reports: &BTreeMap<String, Vec<OfferReport>>,
    ) -> Vec<PublishOutcome> {
        let mut outcomes: Vec<PublishOutcome> = Vec::with_capacity(reports.len());
        for (name, records) in reports {
            let location: ObjectLocation = self
                .location_for(name)
                .unwrap_or_else(|_| ObjectLocation::new(self.bucket.clone(), name.clone()));
            let result = self.publish_one(name, records).await;
            match &result {
                Ok(summary) => log::info!(
                    "Published report {} ({} records, {} bytes) to {}",
                    name,
                    records.len(),
                    summary.total_bytes,
                    location
                ),
                Err(err) => log::error!("Failed to publish report {}: {}", name, err),
            }
            outcomes.push(PublishOutcome {
                name: name.clone(),
                location,
                result,
            });
        }
        outcomes
    }

    fn uploader(&self) -> MultipartUploader<C> {
        let mut attributes = ObjectAttributes::new().with_content_type(self.format.content_type());
        for (k, v) in &self.tags {
            attributes = attributes.with_tag(k.clone(), v.clone());
        }
        let uploader = MultipartUploader::new(Arc::clone(&self.client))
            .with_settings(self.settings.clone())
            .with_attributes(attributes);
        match &self.observer {
            Some(observer) => uploader.with_observer(Arc::clone(observer)),
            None => uploader,
        }
    }
}

fn validate_name(name: &str) -> Result<(), ReportError> {
    let reason: Option<&'static str> = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ReportError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
