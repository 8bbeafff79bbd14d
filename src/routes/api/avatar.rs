use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{post, put},
};

use crate::{
    auth::UserRole,
    error::AppError,
    middleware::AuthRoleGuard,
    response::{ApiResult, JsonApiResponse},
    services::{ServiceContext, avatar_service::PresignedUpload},
    state::AppState,
};

use super::payloads::{AvatarConfirmRequest, AvatarResponse, AvatarUploadUrlRequest};

const FILE_FIELD: &str = "file";
// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.storage.max_avatar_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route(
            "/me/avatar",
            put(upload_avatar)
                .delete(remove_avatar)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/me/avatar/upload-url", post(upload_url))
        .route("/me/avatar/confirm", post(confirm_upload))
        .with_state(state)
}

async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    mut multipart: Multipart,
) -> ApiResult<AvatarResponse> {
    let user_id = claims.user_id()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("Invalid multipart body: {err}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("Missing file content type"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("Invalid multipart body: {err}")))?;

        let services = ServiceContext::from_state(state.as_ref());
        let image_url = services
            .avatar()
            .upload(user_id, &content_type, bytes.to_vec())
            .await?;
        return JsonApiResponse::ok(AvatarResponse {
            image_url: Some(image_url),
        });
    }

    Err(AppError::bad_request("Missing `file` field"))
}

async fn remove_avatar(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
) -> ApiResult<AvatarResponse> {
    let services = ServiceContext::from_state(state.as_ref());
    services.avatar().remove(claims.user_id()?).await?;
    JsonApiResponse::ok(AvatarResponse { image_url: None })
}

async fn upload_url(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    Json(body): Json<AvatarUploadUrlRequest>,
) -> ApiResult<PresignedUpload> {
    let services = ServiceContext::from_state(state.as_ref());
    let upload = services
        .avatar()
        .presign_upload(claims.user_id()?, &body.content_type)?;
    JsonApiResponse::ok(upload)
}

async fn confirm_upload(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    Json(body): Json<AvatarConfirmRequest>,
) -> ApiResult<AvatarResponse> {
    let services = ServiceContext::from_state(state.as_ref());
    let image_url = services
        .avatar()
        .confirm_upload(claims.user_id()?, &body.key)
        .await?;
    JsonApiResponse::ok(AvatarResponse {
        image_url: Some(image_url),
    })
}
