//! Artifact upload
//!
//! The finished artifact is written to blob storage under the job's bucket
//! and key. [`ObjectStoreBlobStore`] talks to S3 or any S3-compatible
//! provider through `object_store`; tests hand it an in-memory store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::error::{Result, UploadError};
use crate::model::Destination;

/// Destination of finished artifacts
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file to the destination
    ///
    /// # Arguments
    /// * `local` - Path of the finished artifact
    /// * `destination` - Bucket and key to write
    async fn put(&self, local: &Path, destination: &Destination) -> Result<()>;
}

/// [`BlobStore`] backed by `object_store`
pub struct ObjectStoreBlobStore {
    config: StorageConfig,
    /// Store used for every bucket instead of building one per bucket
    fixed: Option<Arc<dyn ObjectStore>>,
}

impl ObjectStoreBlobStore {
    /// Create a blob store that connects to S3 per destination bucket
    pub fn from_config(config: StorageConfig) -> Self {
        Self {
            config,
            fixed: None,
        }
    }

    /// Create a blob store writing every artifact into the given store
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: StorageConfig::default(),
            fixed: Some(store),
        }
    }

    fn store_for(&self, destination: &Destination) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = &self.fixed {
            return Ok(Arc::clone(store));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&destination.bucket)
            .with_region(&self.config.region)
            .with_allow_http(self.config.allow_http);
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &self.config.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &self.config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder
            .build()
            .map_err(|e| UploadError::from_store_error(destination.key.as_str(), &e))?;
        Ok(Arc::new(store))
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn put(&self, local: &Path, destination: &Destination) -> Result<()> {
        let store = self.store_for(destination)?;
        let body = tokio::fs::read(local).await?;
        let size = body.len();
        let location = ObjectPath::from(destination.key.as_str());

        if let Err(e) = store.put(&location, PutPayload::from(body)).await {
            let upload = UploadError::from_store_error(destination.key.as_str(), &e);
            error!(
                "Upload to {}/{} rejected: status={} code={} message={}",
                destination.bucket,
                destination.key,
                upload
                    .status
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                upload.provider.code,
                upload.provider.message
            );
            return Err(upload.into());
        }

        info!(
            "Uploaded {} bytes to {}/{}",
            size, destination.bucket, destination.key
        );
        Ok(())
    }
}
