use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    auth::AdminRole,
    db::dao::PaginatedResponse,
    middleware::AuthRoleGuard,
    response::{ApiResult, JsonApiResponse},
    services::{
        ServiceContext, SessionView, UserView,
        admin_service::{BulkOutcome, DashboardStats, UserListQuery},
    },
    state::AppState,
};

use super::payloads::{ApproveRequest, BulkRequest, RevokedSessions, SetRoleRequest};

type AdminGuard = AuthRoleGuard<AdminRole>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user).delete(delete_user))
        .route("/admin/users/{id}/role", patch(set_role))
        .route("/admin/users/{id}/approve", post(approve))
        .route(
            "/admin/users/{id}/sessions",
            get(list_sessions).delete(revoke_sessions),
        )
        .route("/admin/users/bulk/approve", post(bulk_approve))
        .route("/admin/users/bulk/delete", post(bulk_delete))
        .route("/admin/users/bulk/revoke-sessions", post(bulk_revoke_sessions))
        .with_state(state)
}

async fn stats(State(state): State<Arc<AppState>>, _: AdminGuard) -> ApiResult<DashboardStats> {
    let services = ServiceContext::from_state(state.as_ref());
    JsonApiResponse::ok(services.admin().stats().await?)
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _: AdminGuard,
    Query(query): Query<UserListQuery>,
) -> ApiResult<PaginatedResponse<UserView>> {
    let services = ServiceContext::from_state(state.as_ref());
    JsonApiResponse::ok(services.admin().list_users(query).await?)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    _: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<UserView> {
    let services = ServiceContext::from_state(state.as_ref());
    JsonApiResponse::ok(services.admin().get_user(id).await?)
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Path(id): Path<Uuid>,
    Json(body): Json<SetRoleRequest>,
) -> ApiResult<UserView> {
    let services = ServiceContext::from_state(state.as_ref());
    let view = services
        .admin()
        .set_role(claims.user_id()?, id, &body.role)
        .await?;
    JsonApiResponse::ok(view)
}

async fn approve(
    State(state): State<Arc<AppState>>,
    _: AdminGuard,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> ApiResult<UserView> {
    let role = body.and_then(|Json(body)| body.role);
    let services = ServiceContext::from_state(state.as_ref());
    let view = services.admin().approve(id, role.as_deref()).await?;
    JsonApiResponse::ok(view)
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let services = ServiceContext::from_state(state.as_ref());
    services.admin().delete_user(claims.user_id()?, id).await?;
    JsonApiResponse::ok(serde_json::Value::Null)
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    _: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<SessionView>> {
    let services = ServiceContext::from_state(state.as_ref());
    JsonApiResponse::ok(services.admin().list_sessions(id).await?)
}

async fn revoke_sessions(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<RevokedSessions> {
    let services = ServiceContext::from_state(state.as_ref());
    let revoked = services
        .admin()
        .revoke_sessions(claims.user_id()?, id)
        .await?;
    JsonApiResponse::ok(RevokedSessions { revoked })
}

async fn bulk_approve(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Json(body): Json<BulkRequest>,
) -> ApiResult<BulkOutcome> {
    let services = ServiceContext::from_state(state.as_ref());
    let outcome = services
        .admin()
        .bulk_approve(claims.user_id()?, body.ids)
        .await?;
    JsonApiResponse::ok(outcome)
}

async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Json(body): Json<BulkRequest>,
) -> ApiResult<BulkOutcome> {
    let services = ServiceContext::from_state(state.as_ref());
    let outcome = services
        .admin()
        .bulk_delete(claims.user_id()?, body.ids)
        .await?;
    JsonApiResponse::ok(outcome)
}

async fn bulk_revoke_sessions(
    State(state): State<Arc<AppState>>,
    AuthRoleGuard { claims, .. }: AdminGuard,
    Json(body): Json<BulkRequest>,
) -> ApiResult<BulkOutcome> {
    let services = ServiceContext::from_state(state.as_ref());
    let outcome = services
        .admin()
        .bulk_revoke_sessions(claims.user_id()?, body.ids)
        .await?;
    JsonApiResponse::ok(outcome)
}
