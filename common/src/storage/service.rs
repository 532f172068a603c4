// Feed store trait and object-storage implementation
// The pipeline only sees FeedStore; MinIO stays behind it

use crate::errors::StorageError;
use crate::storage::MinioClient;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Storage operations the dispatch pipeline needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Fetch the raw document stored at `path`
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Overwrite `dest` with the document at `src`
    async fn copy(&self, src: &str, dest: &str) -> Result<(), StorageError>;

    /// Write `body` to `path` with no-cache semantics
    async fn put(&self, path: &str, body: &[u8]) -> Result<(), StorageError>;
}

/// FeedStore backed by a MinIO / S3 bucket
pub struct ObjectFeedStore {
    client: MinioClient,
}

impl ObjectFeedStore {
    pub fn new(client: MinioClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedStore for ObjectFeedStore {
    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let data = self.client.get_object(path).await?;
        debug!(size = data.len(), "Feed document loaded");
        Ok(data)
    }

    #[instrument(skip(self), fields(src = %src, dest = %dest))]
    async fn copy(&self, src: &str, dest: &str) -> Result<(), StorageError> {
        self.client.copy_object(src, dest).await
    }

    #[instrument(skip(self, body), fields(path = %path, size = body.len()))]
    async fn put(&self, path: &str, body: &[u8]) -> Result<(), StorageError> {
        self.client.put_object(path, body).await
    }
}
