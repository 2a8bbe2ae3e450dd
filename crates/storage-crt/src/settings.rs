//! Connection settings for the AWS backend.

/// Configuration for constructing a `CrtMultipartClient`.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// AWS region.
    pub region: String,
    /// Static credentials. When None the default provider chain is used.
    pub credentials: Option<AwsCredentials>,
    /// Account id every request asserts owns the bucket.
    pub expected_bucket_owner: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            credentials: None,
            expected_bucket_owner: None,
        }
    }
}

impl StorageSettings {
    /// Settings for a region with the default credential chain.
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Use static credentials instead of the provider chain.
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Require the bucket to be owned by `account_id`.
    pub fn with_expected_bucket_owner(mut self, account_id: impl Into<String>) -> Self {
        self.expected_bucket_owner = Some(account_id.into());
        self
    }
}

/// AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}
