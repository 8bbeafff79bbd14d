use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    auth::UserRole,
    middleware::AuthRoleGuard,
    response::{ApiResult, JsonApiResponse},
    services::{ServiceContext, SessionView},
    state::AppState,
};

use super::payloads::RevokedSessions;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/me/sessions", get(list_sessions).delete(revoke_other_sessions))
        .route("/me/sessions/{id}", delete(revoke_session))
        .with_state(state)
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
) -> ApiResult<Vec<SessionView>> {
    let services = ServiceContext::from_state(state.as_ref());
    let sessions = services
        .session()
        .list_active(claims.user_id()?, Some(claims.session_id()?))
        .await?;
    JsonApiResponse::ok(sessions)
}

async fn revoke_other_sessions(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
) -> ApiResult<RevokedSessions> {
    let services = ServiceContext::from_state(state.as_ref());
    let revoked = services
        .session()
        .revoke_all(claims.user_id()?, Some(claims.session_id()?))
        .await?;
    JsonApiResponse::ok(RevokedSessions { revoked })
}

async fn revoke_session(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AuthRoleGuard<UserRole>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let services = ServiceContext::from_state(state.as_ref());
    services.session().revoke(claims.user_id()?, id).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}
