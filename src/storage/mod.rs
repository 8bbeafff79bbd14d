mod memory;
mod s3;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store};

use crate::config::{StorageConfig, StorageProviderId};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What a HEAD request reports; the body is not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<StoredObject>>;

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectSummary>>;

    fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// The uploader must send the same `Content-Type`.
    fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> StorageResult<String>;
}

pub(crate) fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn build_store(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match cfg.provider {
        StorageProviderId::Memory => Arc::new(MemoryStore::new(&cfg.bucket)),
        StorageProviderId::S3 => Arc::new(S3Store::new(S3Settings::from(cfg))?),
    };
    tracing::info!(provider = ?cfg.provider, bucket = %cfg.bucket, "object store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::check_key;

    #[test]
    fn check_key_rejects_traversal_and_empty_segments() {
        assert!(check_key("avatars/u1/a.png").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/avatars/a.png").is_err());
        assert!(check_key("avatars//a.png").is_err());
        assert!(check_key("avatars/../secrets").is_err());
    }
}
