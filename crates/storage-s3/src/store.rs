//! Anonymous S3 client behind the [`RemoteStore`] interface.

use std::path::Path;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use atlas_cache_common::{ProgressCallback, TransferProgress};
use atlas_cache_storage::{RemoteStore, StoreError, MANIFEST_FILE_NAME, MANIFEST_PREFIX};

/// Region the public atlas buckets are hosted in, used when the
/// environment configures none.
const DEFAULT_REGION: &str = "us-west-2";

/// Remote store reading a public S3 bucket anonymously.
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
}

impl S3RemoteStore {
    /// Connect to a public bucket with unsigned requests.
    ///
    /// # Arguments
    /// * `bucket` - Name of the bucket the dataset is published in
    pub async fn connect(bucket: impl Into<String>) -> Self {
        let region: RegionProviderChain =
            RegionProviderChain::default_provider().or_else(DEFAULT_REGION);
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .no_credentials()
            .load()
            .await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    /// Wrap an existing S3 client. Useful when the caller manages client
    /// configuration (endpoint overrides, test harnesses).
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// The bucket this store reads from.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn list_manifests(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(MANIFEST_PREFIX)
            .into_paginator()
            .send();

        // A long-lived dataset can publish well over one page (1000 keys)
        // of release objects.
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::Network {
                key: MANIFEST_PREFIX.to_string(),
                message: e.to_string(),
            })?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    if is_manifest_key(key) {
                        keys.push(key.to_string());
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get_manifest(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| get_object_error(key, e))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Network {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn download_object(
        &self,
        key: &str,
        dest: &Path,
        progress: Option<&dyn ProgressCallback<TransferProgress>>,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| get_object_error(key, e))?;
        let total_bytes: Option<u64> = response.content_length().map(|len| len as u64);
        debug!(key, ?total_bytes, dest = %dest.display(), "streaming object");

        let mut file: tokio::fs::File =
            tokio::fs::File::create(dest).await.map_err(|e| StoreError::Io {
                path: dest.display().to_string(),
                message: e.to_string(),
            })?;

        let mut body = response.body;
        let mut bytes_transferred: u64 = 0;
        while let Some(chunk) = body.try_next().await.map_err(|e| StoreError::Network {
            key: key.to_string(),
            message: e.to_string(),
        })? {
            file.write_all(&chunk).await.map_err(|e| StoreError::Io {
                path: dest.display().to_string(),
                message: e.to_string(),
            })?;
            bytes_transferred += chunk.len() as u64;

            if let Some(callback) = progress {
                let keep_going: bool = callback.on_progress(&TransferProgress {
                    key: key.to_string(),
                    bytes_transferred,
                    total_bytes,
                });
                if !keep_going {
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(StoreError::Network {
                        key: key.to_string(),
                        message: "transfer cancelled by progress callback".to_string(),
                    });
                }
            }
        }

        file.flush().await.map_err(|e| StoreError::Io {
            path: dest.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// Whether a listed key names a release manifest rather than some other
/// object sharing the `releases/` prefix.
fn is_manifest_key(key: &str) -> bool {
    key.strip_prefix(MANIFEST_PREFIX)
        .and_then(|rest| rest.split_once('/'))
        .is_some_and(|(version, file)| !version.is_empty() && file == MANIFEST_FILE_NAME)
}

fn get_object_error(
    key: &str,
    err: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::get_object::GetObjectError>,
) -> StoreError {
    let service_error = err.into_service_error();
    if service_error.is_no_such_key() {
        StoreError::NotFound {
            key: key.to_string(),
        }
    } else {
        StoreError::Network {
            key: key.to_string(),
            message: service_error.to_string(),
        }
    }
}
