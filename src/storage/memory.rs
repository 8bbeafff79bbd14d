use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ObjectMeta, ObjectStore, ObjectSummary, StorageResult, StoredObject, check_key};

/// Process-local object store for development and tests.
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn presign(&self, key: &str, ttl: Duration, method: Option<&str>) -> StorageResult<String> {
        check_key(key)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let mut url = format!("memory://{}/{}?expires={expires}", self.bucket, key);
        if let Some(method) = method {
            url.push_str("&method=");
            url.push_str(method);
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> StorageResult<()> {
        check_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        check_key(key)?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        check_key(key)?;
        Ok(self.objects.read().await.get(key).map(|object| ObjectMeta {
            content_type: object.content_type.clone(),
            size: object.bytes.len() as u64,
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectSummary>> {
        let objects = self.objects.read().await;
        let mut found: Vec<ObjectSummary> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.bytes.len() as u64,
            })
            .collect();
        found.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(found)
    }

    fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign(key, ttl, None)
    }

    fn presign_put(&self, key: &str, _content_type: &str, ttl: Duration) -> StorageResult<String> {
        self.presign(key, ttl, Some("PUT"))
    }
}
