use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use validator::Validate;

use crate::{
    auth::UserRole,
    middleware::AuthRoleGuard,
    response::{ApiResult, JsonApiResponse},
    services::{
        ServiceContext, UserView,
        user_service::{PasswordChange, ProfileUpdate},
    },
    state::AppState,
};

use super::payloads::{ChangePasswordRequest, RevokedSessions, UpdateProfileRequest};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/me", get(profile).patch(update_profile))
        .route("/me/password", put(change_password))
        .with_state(state)
}

async fn profile(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
) -> ApiResult<UserView> {
    let services = ServiceContext::from_state(state.as_ref());
    let view = services.user().profile(claims.user_id()?).await?;
    JsonApiResponse::ok(view)
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<UserView> {
    body.validate()?;
    let services = ServiceContext::from_state(state.as_ref());
    let view = services
        .user()
        .update_profile(
            claims.user_id()?,
            ProfileUpdate {
                name: body.name,
                email: body.email,
            },
        )
        .await?;
    JsonApiResponse::ok(view)
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<RevokedSessions> {
    body.validate()?;
    let services = ServiceContext::from_state(state.as_ref());
    let revoked = services
        .user()
        .change_password(
            claims.user_id()?,
            PasswordChange {
                current: body.current_password,
                new: body.new_password,
                revoke_other_sessions: body.revoke_other_sessions,
            },
            claims.session_id()?,
        )
        .await?;
    JsonApiResponse::ok(RevokedSessions { revoked })
}
