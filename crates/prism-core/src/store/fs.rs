//! Filesystem-backed object store.
//!
//! Objects live at `<root>/<bucket>/<key>`, with `/` in keys mapped to
//! subdirectories. Content type is not persisted; reads infer it from the
//! key's extension.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{content_type_for_key, ObjectStore, StoredObject};
use crate::error::StoreError;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a bucket/key address to a path under the root.
    ///
    /// Addresses that would escape the root are refused.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let denied = |message: &str| StoreError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        };

        if bucket.is_empty()
            || bucket.contains(['/', '\\'])
            || bucket == "."
            || bucket == ".."
        {
            return Err(denied("invalid bucket name"));
        }

        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(denied("key does not name an object inside the bucket"));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn map_io_error(bucket: &str, key: &str, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        ErrorKind::PermissionDenied => StoreError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        },
        _ => StoreError::Io {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for FileSystemStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.object_path(bucket, key)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| map_io_error(bucket, key, e))?;
        Ok(StoredObject {
            bytes,
            content_type: content_type_for_key(key).to_string(),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(bucket, key, e))?;
        }

        // Write beside the target and rename so readers never see a partial object.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| map_io_error(bucket, key, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(map_io_error(bucket, key, e));
        }

        tracing::trace!(
            "Stored {} bytes ({}) at {}",
            bytes.len(),
            content_type,
            path.display()
        );
        Ok(())
    }
}
