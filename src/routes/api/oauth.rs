use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    auth::DeviceInfo,
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    services::{ServiceContext, oauth_service::AuthorizeRedirect},
    state::AppState,
};

use super::{
    auth::outcome_response,
    payloads::{OAuthCallbackQuery, SignUpResponse},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/oauth/{provider}/authorize", get(authorize))
        .route("/auth/oauth/{provider}/callback", get(callback))
        .with_state(state)
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> ApiResult<AuthorizeRedirect> {
    let services = ServiceContext::from_state(state.as_ref());
    let redirect = services
        .oauth(&state.oauth_providers, &state.auth_providers)
        .begin(&provider)
        .await?;
    JsonApiResponse::ok(redirect)
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    device: DeviceInfo,
) -> ApiResult<SignUpResponse> {
    if let Some(error) = query.error {
        tracing::info!(provider = %provider, error = %error, "oauth authorization denied");
        return Err(AppError::bad_request(format!(
            "OAuth authorization failed: {error}"
        )));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(AppError::bad_request("Missing code or state"));
    };

    let services = ServiceContext::from_state(state.as_ref());
    let outcome = services
        .oauth(&state.oauth_providers, &state.auth_providers)
        .complete(&provider, &code, &oauth_state, &device)
        .await?;
    outcome_response(outcome)
}
