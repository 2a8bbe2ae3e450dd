//! Integration tests for publishing reports through the in-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use rusty_multipart_reports::{parse_json_lines, OfferReport, ReportError, ReportFormat, ReportPublisher};
use rusty_multipart_storage::{
    CompletedPart, MemoryMultipartClient, MultipartClient, ObjectAttributes, ObjectLocation,
    StorageError, UploadError,
};

/// Store that refuses to start uploads for one key.
#[derive(Default)]
struct PickyStore {
    inner: MemoryMultipartClient,
    refused_key: String,
    aborts: AtomicUsize,
}

#[async_trait]
impl MultipartClient for PickyStore {
    async fn create_multipart_upload(
        &self,
        location: &ObjectLocation,
        attributes: &ObjectAttributes,
    ) -> Result<String, StorageError> {
        if location.key == self.refused_key {
            return Err(StorageError::AccessDenied {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                message: "explicit deny".to_string(),
            });
        }
        self.inner.create_multipart_upload(location, attributes).await
    }

    async fn upload_part(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        part_number: u32,
        is_last: bool,
        body: Bytes,
    ) -> Result<String, StorageError> {
        self.inner
            .upload_part(location, upload_id, part_number, is_last, body)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        self.inner
            .complete_multipart_upload(location, upload_id, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_multipart_upload(location, upload_id).await
    }
}

fn reports() -> BTreeMap<String, Vec<OfferReport>> {
    let mut reports = BTreeMap::new();
    reports.insert(
        "customer-1".to_string(),
        vec![
            OfferReport::new("customer-1", "p-100", "price expired"),
            OfferReport::new("customer-1", "p-101", "out of stock"),
        ],
    );
    reports.insert(
        "customer-2".to_string(),
        vec![OfferReport::new("customer-2", "p-200", "region not served")],
    );
    reports.insert(
        "customer-3".to_string(),
        vec![OfferReport::new("customer-3", "p-300", "duplicate offer")],
    );
    reports
}

#[tokio::test]
async fn test_publish_all_stores_every_report() {
    let store = Arc::new(MemoryMultipartClient::new());
    let publisher = ReportPublisher::new(store.clone(), "offer-reports", "daily/")
        .with_tag("pipeline", "offers");

    let outcomes = publisher.publish_all(&reports()).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_published()));

    let location = ObjectLocation::new("offer-reports", "daily/customer-1.jsonl");
    let object = store.object(&location).unwrap();
    assert_eq!(parse_json_lines(&object.data).unwrap(), reports()["customer-1"]);
    assert_eq!(
        object.attributes.content_type.as_deref(),
        Some(ReportFormat::JsonLines.content_type())
    );
    assert_eq!(object.attributes.tagging().as_deref(), Some("pipeline=offers"));
}

#[tokio::test]
async fn test_publish_all_continues_after_failure() {
    let store = Arc::new(PickyStore {
        refused_key: "daily/customer-2.json".to_string(),
        ..PickyStore::default()
    });
    let publisher = ReportPublisher::new(store.clone(), "offer-reports", "daily")
        .with_format(ReportFormat::JsonArray);

    let outcomes = publisher.publish_all(&reports()).await;

    let published: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.is_published())
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(published, vec!["customer-1", "customer-3"]);

    let failed = outcomes.iter().find(|o| o.name == "customer-2").unwrap();
    assert_eq!(failed.location.key, "daily/customer-2.json");
    assert!(matches!(
        failed.result,
        Err(ReportError::Upload(UploadError::InitiateFailed { .. }))
    ));
    // Nothing was initiated, so nothing needed aborting.
    assert_eq!(store.aborts.load(Ordering::SeqCst), 0);

    let stored = store
        .inner
        .object(&ObjectLocation::new("offer-reports", "daily/customer-3.json"))
        .unwrap();
    let parsed: Vec<OfferReport> = serde_json::from_slice(&stored.data).unwrap();
    assert_eq!(parsed, reports()["customer-3"]);
}

#[tokio::test]
async fn test_invalid_name_is_reported_not_uploaded() {
    let store = Arc::new(MemoryMultipartClient::new());
    let publisher = ReportPublisher::new(store.clone(), "offer-reports", "daily");
    let mut reports = BTreeMap::new();
    reports.insert("bad/name".to_string(), vec![OfferReport::new("c", "p", "e")]);

    let outcomes = publisher.publish_all(&reports).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].result, Err(ReportError::InvalidName { .. })));
    assert_eq!(store.active_uploads(), 0);
}

#[tokio::test]
async fn test_publish_one_returns_summary() {
    let store = Arc::new(MemoryMultipartClient::new());
    let publisher = ReportPublisher::new(store.clone(), "offer-reports", "");

    let summary = publisher
        .publish_one("customer-9", &[OfferReport::new("customer-9", "p-1", "expired")])
        .await
        .unwrap();

    assert_eq!(summary.location.key, "customer-9.jsonl");
    assert_eq!(summary.part_count(), 1);
    assert!(summary.content_hash.is_some());
}
