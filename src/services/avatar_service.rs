use std::{sync::Arc, time::Duration};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::jwt::random_token,
    db::dao::{DaoBase, UserDao},
    error::AppError,
    services::user_service::user_not_found,
    storage::{ObjectStore, StorageError},
};

const AVATAR_ROOT: &str = "avatars";
const KEY_TOKEN_LEN: usize = 16;

const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PresignedUpload {
    pub key: String,
    pub url: String,
    pub expires_in: u64,
}

fn extension_for(content_type: &str) -> Result<&'static str, AppError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| AppError::bad_request("Unsupported image type"))
}

pub fn user_prefix(user_id: Uuid) -> String {
    format!("{AVATAR_ROOT}/{user_id}/")
}

#[derive(Clone)]
pub struct AvatarService {
    user_dao: UserDao,
    store: Arc<dyn ObjectStore>,
    presign_ttl: Duration,
    max_bytes: usize,
}

impl AvatarService {
    pub fn new(
        user_dao: UserDao,
        store: Arc<dyn ObjectStore>,
        presign_ttl: Duration,
        max_bytes: usize,
    ) -> Self {
        Self {
            user_dao,
            store,
            presign_ttl,
            max_bytes,
        }
    }

    fn check_size(&self, len: u64) -> Result<(), AppError> {
        if len == 0 {
            return Err(AppError::bad_request("Avatar file is empty"));
        }
        if len > self.max_bytes as u64 {
            return Err(AppError::bad_request(format!(
                "Avatar exceeds {} bytes",
                self.max_bytes
            )));
        }
        Ok(())
    }

    fn new_key(user_id: Uuid, ext: &str) -> String {
        format!("{}{}.{ext}", user_prefix(user_id), random_token(KEY_TOKEN_LEN))
    }

    /// Stores the image and makes it the user's avatar.
    pub async fn upload(
        &self,
        user_id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let ext = extension_for(content_type)?;
        self.check_size(bytes.len() as u64)?;

        let key = Self::new_key(user_id, ext);
        self.store.put(&key, content_type, bytes).await?;
        match self.attach(user_id, key.clone()).await {
            Ok(url) => Ok(url),
            Err(err) => {
                self.delete_logged(&key).await;
                Err(err)
            }
        }
    }

    /// Url for a direct browser upload. Nothing changes until
    /// `confirm_upload` is called with the returned key.
    pub fn presign_upload(
        &self,
        user_id: Uuid,
        content_type: &str,
    ) -> Result<PresignedUpload, AppError> {
        let ext = extension_for(content_type)?;
        let key = Self::new_key(user_id, ext);
        let url = self.store.presign_put(&key, content_type, self.presign_ttl)?;
        Ok(PresignedUpload {
            key,
            url,
            expires_in: self.presign_ttl.as_secs(),
        })
    }

    pub async fn confirm_upload(&self, user_id: Uuid, key: &str) -> Result<String, AppError> {
        let key_ok = key
            .strip_prefix(&user_prefix(user_id))
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'));
        if !key_ok {
            return Err(AppError::bad_request("Avatar key does not belong to this user"));
        }

        let meta = self
            .store
            .head(key)
            .await?
            .ok_or_else(|| AppError::bad_request("Uploaded avatar not found"))?;
        let checked = extension_for(&meta.content_type).and(self.check_size(meta.size));
        if let Err(err) = checked {
            self.delete_logged(key).await;
            return Err(err);
        }

        self.attach(user_id, key.to_string()).await
    }

    /// Clears the avatar. Calling it without an avatar is a no-op.
    pub async fn remove(&self, user_id: Uuid) -> Result<(), AppError> {
        let user = self.user_dao.find_by_id(user_id).await.map_err(user_not_found)?;
        let Some(image) = user.image else {
            return Ok(());
        };

        self.store.delete(&image).await?;
        self.user_dao.set_image(user_id, None).await?;
        tracing::info!(user_id = %user_id, "avatar removed");
        Ok(())
    }

    /// Presigned GET url for a stored avatar key.
    pub fn avatar_url(&self, image: Option<&str>) -> Option<String> {
        let key = image?;
        match self.store.presign_get(key, self.presign_ttl) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = %err, key, "failed to presign avatar");
                None
            }
        }
    }

    /// Deletes every object under the user's prefix.
    pub async fn purge_user(&self, user_id: Uuid) -> Result<usize, StorageError> {
        let objects = self.store.list(&user_prefix(user_id)).await?;
        for object in &objects {
            self.store.delete(&object.key).await?;
        }
        Ok(objects.len())
    }

    async fn attach(&self, user_id: Uuid, key: String) -> Result<String, AppError> {
        let user = self.user_dao.find_by_id(user_id).await.map_err(user_not_found)?;
        let previous = user.image;

        self.user_dao.set_image(user_id, Some(key.clone())).await?;
        if let Some(previous) = previous.filter(|previous| *previous != key) {
            self.delete_logged(&previous).await;
        }
        tracing::info!(user_id = %user_id, "avatar updated");

        Ok(self.store.presign_get(&key, self.presign_ttl)?)
    }

    async fn delete_logged(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            tracing::warn!(error = %err, key, "failed to delete avatar object");
        }
    }
}
