//! Object storage targets for export extracts (local filesystem, memory, S3/MinIO).

use std::path::PathBuf;
use std::sync::Arc;

use object_store::{aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, ObjectStore};
use serde::{Deserialize, Serialize};

use landcover_common::{LandcoverError, LandcoverResult};

/// Configuration for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    #[serde(default = "default_region")]
    pub region: String,
    /// Allow HTTP (for local MinIO)
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Where extracts are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageTarget {
    /// A directory on the local filesystem
    Local { root: PathBuf },
    /// Process memory, lost on exit
    Memory,
    S3(ObjectStorageConfig),
}

impl Default for StorageTarget {
    fn default() -> Self {
        StorageTarget::Local {
            root: PathBuf::from("exports"),
        }
    }
}

impl StorageTarget {
    /// Build the object store client.
    pub fn build(&self) -> LandcoverResult<Arc<dyn ObjectStore>> {
        match self {
            StorageTarget::Local { root } => {
                std::fs::create_dir_all(root)?;
                let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
                    LandcoverError::Io(format!(
                        "failed to open export root {}: {}",
                        root.display(),
                        e
                    ))
                })?;
                Ok(Arc::new(store))
            }
            StorageTarget::Memory => Ok(Arc::new(InMemory::new())),
            StorageTarget::S3(config) => {
                let mut builder = AmazonS3Builder::new()
                    .with_endpoint(&config.endpoint)
                    .with_bucket_name(&config.bucket)
                    .with_access_key_id(&config.access_key_id)
                    .with_secret_access_key(&config.secret_access_key)
                    .with_region(&config.region);

                if config.allow_http {
                    builder = builder.with_allow_http(true);
                }

                let store = builder.build().map_err(|e| {
                    LandcoverError::config(format!("failed to create S3 client: {}", e))
                })?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Human-readable location for logs.
    pub fn describe(&self) -> String {
        match self {
            StorageTarget::Local { root } => format!("file://{}", root.display()),
            StorageTarget::Memory => "memory://".to_string(),
            StorageTarget::S3(config) => format!("s3://{}", config.bucket),
        }
    }
}
