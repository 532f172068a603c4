// MinIO / S3 object storage client for feed documents
// No unwrap(), use #[tracing::instrument], proper error handling

use crate::config::MinioConfig;
use crate::errors::StorageError;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Content type of every document this worker writes
const JSON_CONTENT_TYPE: &str = "application/json";

/// Writes must never be served stale by a CDN in front of the bucket
const NO_CACHE: &str = "max-age=0";

/// MinIO client wrapper
#[derive(Clone, Debug)]
pub struct MinioClient {
    bucket: Arc<Bucket>,
    /// Same bucket with `Cache-Control: max-age=0` attached to every request
    write_bucket: Arc<Bucket>,
}

impl MinioClient {
    /// Create a new MinIO client from configuration
    #[instrument(skip(config), fields(endpoint = %config.endpoint, bucket = %config.bucket))]
    pub async fn new(config: &MinioConfig) -> Result<Self, StorageError> {
        info!("Initializing MinIO client");

        // Parse endpoint - strip scheme as rust-s3 Region::Custom doesn't expect it
        let endpoint = config
            .endpoint
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .to_string();

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| {
            error!(error = %e, "Failed to create MinIO credentials");
            StorageError::MinioError(format!("Failed to create credentials: {}", e))
        })?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint,
        };

        let bucket = Bucket::new(&config.bucket, region, credentials).map_err(|e| {
            error!(error = %e, "Failed to create MinIO bucket");
            StorageError::MinioError(format!("Failed to create bucket: {}", e))
        })?;
        let bucket = Bucket::clone(&bucket.with_path_style());

        let mut write_bucket = bucket.clone();
        write_bucket.add_header("Cache-Control", NO_CACHE);

        info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            "MinIO client initialized successfully"
        );

        Ok(Self {
            bucket: Arc::new(bucket),
            write_bucket: Arc::new(write_bucket),
        })
    }

    /// Health check for MinIO connection
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), StorageError> {
        debug!("Performing MinIO health check");

        match self
            .bucket
            .list("".to_string(), Some("/".to_string()))
            .await
        {
            Ok(_) => {
                debug!("MinIO health check passed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "MinIO health check failed");
                Err(StorageError::MinioError(format!(
                    "Health check failed: {}",
                    e
                )))
            }
        }
    }

    /// Store a JSON document with a no-cache directive
    #[instrument(skip(self, data), fields(path = %path, size = data.len()))]
    pub async fn put_object(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        debug!("Storing object to MinIO");

        let response = self
            .write_bucket
            .put_object_with_content_type(path, data, JSON_CONTENT_TYPE)
            .await
            .map_err(|e| {
                error!(error = %e, path = %path, "Failed to store object to MinIO");
                StorageError::MinioError(format!("Failed to put object '{}': {}", path, e))
            })?;

        ensure_success(path, response.status_code())?;

        debug!(path = %path, "Object stored successfully");
        Ok(())
    }

    /// Retrieve data from MinIO at the specified path
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_object(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        debug!("Retrieving object from MinIO");

        let response = self.bucket.get_object(path).await.map_err(|e| {
            error!(error = %e, path = %path, "Failed to retrieve object from MinIO");
            StorageError::MinioError(format!("Failed to get object '{}': {}", path, e))
        })?;

        ensure_success(path, response.status_code())?;

        let data = response.bytes().to_vec();
        debug!(path = %path, size = data.len(), "Object retrieved successfully");
        Ok(data)
    }

    /// Server-side copy of `from` onto `to` within the bucket, overwriting `to`
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn copy_object(&self, from: &str, to: &str) -> Result<(), StorageError> {
        debug!("Copying object in MinIO");

        let status = self
            .write_bucket
            .copy_object_internal(from, to)
            .await
            .map_err(|e| {
                error!(error = %e, from = %from, to = %to, "Failed to copy object in MinIO");
                StorageError::MinioError(format!(
                    "Failed to copy object '{}' to '{}': {}",
                    from, to, e
                ))
            })?;

        ensure_success(from, status)?;

        debug!(from = %from, to = %to, "Object copied successfully");
        Ok(())
    }
}

/// Map non-2xx S3 responses onto storage errors
fn ensure_success(path: &str, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => {
            error!(path = %path, "Object not found in MinIO");
            Err(StorageError::NotFound(path.to_string()))
        }
        status => {
            error!(path = %path, status, "Unexpected MinIO response status");
            Err(StorageError::UnexpectedStatus {
                path: path.to_string(),
                status,
            })
        }
    }
}
