//! Object store capability.
//!
//! Stages read and write images through [`ObjectStore`], injected at
//! construction. Two backends ship with the crate:
//! - **memory**: a process-local map, used by tests and in-process chains
//! - **fs**: one directory per bucket under a root directory

mod fs;
mod memory;

pub use fs::FileSystemStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Content type used when nothing better is known about an image.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Bytes and metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Addressable get/put by bucket and key.
///
/// Uses `async_trait` because the handler holds the store as
/// `Arc<dyn ObjectStore>`. A single `put` is assumed atomic.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logging (e.g., "memory", "fs").
    fn name(&self) -> &str;

    /// Fetch an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError>;

    /// Store an object, replacing any existing one at the same address.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Guess an image content type from a key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
