use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{SignUpOutcome, TokenBundle};

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub new_password: String,
    #[serde(default)]
    pub revoke_other_sessions: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvatarUploadUrlRequest {
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarConfirmRequest {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: usize,
}

impl From<TokenBundle> for TokenResponse {
    fn from(bundle: TokenBundle) -> Self {
        Self {
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            token_type: bundle.token_type,
            expires_in: bundle.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    SignedIn(TokenResponse),
    Pending { user_id: Uuid, pending_approval: bool },
}

impl From<SignUpOutcome> for SignUpResponse {
    fn from(outcome: SignUpOutcome) -> Self {
        match outcome {
            SignUpOutcome::SignedIn(bundle) => Self::SignedIn(bundle.into()),
            SignUpOutcome::PendingApproval { user_id } => Self::Pending {
                user_id,
                pending_approval: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevokedSessions {
    pub revoked: u64,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub image_url: Option<String>,
}
