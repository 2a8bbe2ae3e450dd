//! AWS SDK S3 client implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use rusty_multipart_storage::{
    CompletedPart, MultipartClient, ObjectAttributes, ObjectLocation, StorageError,
};

use crate::error::CrtError;
use crate::settings::StorageSettings;

/// MultipartClient implementation using AWS SDK for Rust.
///
/// Retries, connection pooling and request signing are handled by the SDK.
pub struct CrtMultipartClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Expected bucket owner for security validation.
    expected_bucket_owner: Option<String>,
}

impl CrtMultipartClient {
    /// Create a new client with the default credential chain.
    ///
    /// # Arguments
    /// * `settings` - Region, optional static credentials and bucket owner
    pub async fn new(settings: StorageSettings) -> Result<Self, StorageError> {
        if settings.region.trim().is_empty() {
            return Err(CrtError::ConfigError("region must not be empty".into()).into());
        }

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "rusty-multipart",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let s3_client = S3Client::new(&sdk_config);

        Ok(Self {
            s3_client,
            expected_bucket_owner: settings.expected_bucket_owner,
        })
    }

    /// Create a client from an existing S3Client (for testing).
    ///
    /// # Arguments
    /// * `s3_client` - Pre-configured S3 client
    /// * `expected_bucket_owner` - Optional expected bucket owner
    pub fn from_client(s3_client: S3Client, expected_bucket_owner: Option<String>) -> Self {
        Self {
            s3_client,
            expected_bucket_owner,
        }
    }

    /// Account id asserted on every request, if any.
    pub fn expected_bucket_owner(&self) -> Option<&str> {
        self.expected_bucket_owner.as_deref()
    }
}

#[async_trait]
impl MultipartClient for CrtMultipartClient {
    async fn create_multipart_upload(
        &self,
        location: &ObjectLocation,
        attributes: &ObjectAttributes,
    ) -> Result<String, StorageError> {
        let mut request = self
            .s3_client
            .create_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .set_expected_bucket_owner(self.expected_bucket_owner.clone())
            .set_content_type(attributes.content_type.clone())
            .set_tagging(attributes.tagging());

        for (k, v) in &attributes.metadata {
            request = request.metadata(k, v);
        }

        let output = request
            .send()
            .await
            .map_err(|err| CrtError::from_sdk("CreateMultipartUpload", location, err))?;

        let upload_id: String = output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| CrtError::MissingField {
                operation: "CreateMultipartUpload",
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                field: "UploadId",
            })?;

        log::debug!("S3 issued upload id {} for {}", upload_id, location);
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
        let size: usize = body.len();
        let output = self
            .s3_client
            .upload_part()
            .bucket(&location.bucket)
            .key(&location.key)
            .upload_id(upload_id)
            .part_number(sdk_part_number(part_number)?)
            .content_length(size as i64)
            .set_expected_bucket_owner(self.expected_bucket_owner.clone())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| CrtError::from_sdk("UploadPart", location, err))?;

        let etag: String = output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| CrtError::MissingField {
                operation: "UploadPart",
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                field: "ETag",
            })?;

        log::trace!("Uploaded part {} ({} bytes) of {}", part_number, size, upload_id);
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let mut manifest: Vec<S3CompletedPart> = Vec::with_capacity(parts.len());
        for part in parts {
            manifest.push(
                S3CompletedPart::builder()
                    .part_number(sdk_part_number(part.part_number)?)
                    .e_tag(&part.etag)
                    .build(),
            );
        }

        self.s3_client
            .complete_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .upload_id(upload_id)
            .set_expected_bucket_owner(self.expected_bucket_owner.clone())
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(manifest))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| CrtError::from_sdk("CompleteMultipartUpload", location, err))?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.s3_client
            .abort_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .upload_id(upload_id)
            .set_expected_bucket_owner(self.expected_bucket_owner.clone())
            .send()
            .await
            .map_err(|err| CrtError::from_sdk("AbortMultipartUpload", location, err))?;

        Ok(())
    }
}

/// S3 models part numbers as `i32`.
fn sdk_part_number(part_number: u32) -> Result<i32, StorageError> {
    i32::try_from(part_number).map_err(|_| StorageError::InvalidConfig {
        message: format!("part number {} is out of range", part_number),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crt_client_implements_multipart_client() {
        // Compile-time check that the backend can sit behind the engine.
        fn assert_multipart_client<T: MultipartClient + 'static>() {}
        assert_multipart_client::<CrtMultipartClient>();
    }

    #[test]
    fn test_from_client_keeps_bucket_owner() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let client = CrtMultipartClient::from_client(
            S3Client::from_conf(config),
            Some("123456789012".into()),
        );
        assert_eq!(client.expected_bucket_owner(), Some("123456789012"));
    }

    #[test]
    fn test_sdk_part_number_range() {
        assert_eq!(sdk_part_number(10_000).unwrap(), 10_000);
        assert!(sdk_part_number(u32::MAX).is_err());
    }
}
