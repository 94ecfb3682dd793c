pub mod gcs;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::google::GoogleAuthError;
use crate::lineage::Stage;

pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Auth(#[from] GoogleAuthError),

    #[error("Storage request failed: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub path: String,
    pub stage: Stage,
    pub size: u64,
    pub content_type: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Bucket holding every stage of the image pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError>;

    async fn get(&self, path: &str) -> Result<ObjectData, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    fn public_url(&self, path: &str) -> String;
}

/// Object paths are relative, slash separated and never climb out of the bucket
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::InvalidPath("path is empty".to_string()));
    }
    if path.starts_with('/') {
        return Err(StorageError::InvalidPath(format!("'{}' must be relative", path)));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::InvalidPath(format!("'{}' has an empty or dot segment", path)));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidPath("path contains control characters".to_string()));
    }
    Ok(())
}
