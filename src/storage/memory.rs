use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{validate_path, ObjectData, ObjectStore, StorageError, StoredObject};
use crate::lineage::Stage;

struct Entry {
    bytes: Vec<u8>,
    content_type: String,
    updated_at: DateTime<Utc>,
}

/// Process-local bucket, used in development when no bucket is configured
pub struct MemoryObjectStore {
    public_base: String,
    objects: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryObjectStore {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    fn describe(&self, path: &str, entry: &Entry) -> StoredObject {
        StoredObject {
            path: path.to_string(),
            stage: Stage::of_path(path),
            size: entry.bytes.len() as u64,
            content_type: Some(entry.content_type.clone()),
            updated_at: Some(entry.updated_at),
            url: self.public_url(path),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        validate_path(path)?;
        let entry = Entry {
            bytes,
            content_type: content_type.to_string(),
            updated_at: Utc::now(),
        };
        let stored = self.describe(path, &entry);
        self.objects.write().await.insert(path.to_string(), entry);
        Ok(stored)
    }

    async fn get(&self, path: &str) -> Result<ObjectData, StorageError> {
        validate_path(path)?;
        let objects = self.objects.read().await;
        let entry = objects
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        Ok(ObjectData {
            bytes: entry.bytes.clone(),
            content_type: Some(entry.content_type.clone()),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        self.objects
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, entry)| self.describe(path, entry))
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}
