//! S3-compatible object store for snapshot uploads
//!
//! Keys are laid out `<prefix>/<cluster>/<backup-name>`; bucket, prefix and
//! endpoint come from operator flags, credentials from the standard AWS
//! environment.

use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;

use crate::controller::error::{Error, Result};

pub struct BackupStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl BackupStore {
    pub async fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Object key for one cluster's backup
    pub fn key(&self, cluster: &str, backup: &str) -> String {
        object_key(&self.prefix, cluster, backup)
    }

    /// Upload a snapshot, returning its store location
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;

        Ok(())
    }
}

/// `<prefix>/<cluster>/<backup>`, skipping an empty prefix
pub fn object_key(prefix: &str, cluster: &str, backup: &str) -> String {
    [prefix, cluster, backup]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
