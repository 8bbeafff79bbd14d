use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::db::entities::{session, user};

/// A user as the API shows it. The password hash never leaves the service
/// layer; `image_url` is a presigned link, not the storage key.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub email_verified: bool,
    pub image_url: Option<String>,
    pub has_password: bool,
    pub created_at: DateTime<FixedOffset>,
    pub last_sign_in_at: Option<DateTime<FixedOffset>>,
}

impl UserView {
    pub fn new(model: user::Model, image_url: Option<String>) -> Self {
        Self {
            id: model.id,
            has_password: model.password_hash.is_some(),
            email: model.email,
            name: model.name,
            role: model.role,
            email_verified: model.email_verified,
            image_url,
            created_at: model.created_at,
            last_sign_in_at: model.last_sign_in_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub last_used_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
    pub is_current: bool,
}

impl SessionView {
    pub fn new(model: session::Model, current: Option<Uuid>) -> Self {
        Self {
            is_current: current == Some(model.id),
            id: model.id,
            user_agent: model.user_agent,
            ip_address: model.ip_address,
            created_at: model.created_at,
            last_used_at: model.updated_at,
            expires_at: model.expires_at,
        }
    }
}
