//! In-memory object store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ObjectStore, StoredObject};
use crate::error::StoreError;
use crate::types::ObjectLocation;

/// Process-local object store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectLocation, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Keys in a bucket, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.read().await;
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|location| location.bucket == bucket)
            .map(|location| location.key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let objects = self.objects.read().await;
        objects
            .get(&ObjectLocation::new(bucket, key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let object = StoredObject {
            bytes,
            content_type: content_type.to_string(),
        };
        self.objects
            .write()
            .await
            .insert(ObjectLocation::new(bucket, key), object);
        Ok(())
    }
}
