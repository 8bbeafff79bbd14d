use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use validator::Validate;

use crate::{
    auth::{DeviceInfo, SignUp, SignUpOutcome},
    middleware::AuthGuard,
    response::{ApiResult, JsonApiResponse},
    services::ServiceContext,
    state::AppState,
};

use super::payloads::{RefreshRequest, SignInRequest, SignUpRequest, SignUpResponse, TokenResponse};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/sign-out", post(sign_out))
        .with_state(state)
}

/// Success and pending sign-ups share one envelope with different statuses.
pub(crate) fn outcome_response(outcome: SignUpOutcome) -> ApiResult<SignUpResponse> {
    match outcome {
        SignUpOutcome::SignedIn(_) => {
            JsonApiResponse::with_status(StatusCode::CREATED, "signed in", outcome.into())
        }
        SignUpOutcome::PendingApproval { .. } => JsonApiResponse::with_status(
            StatusCode::ACCEPTED,
            "Account pending approval",
            outcome.into(),
        ),
    }
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    device: DeviceInfo,
    Json(body): Json<SignUpRequest>,
) -> ApiResult<SignUpResponse> {
    body.validate()?;
    let services = ServiceContext::from_state(state.as_ref());
    let outcome = services
        .auth(&state.auth_providers)
        .register(
            SignUp {
                email: body.email,
                password: body.password,
                name: body.name,
            },
            &device,
        )
        .await?;
    outcome_response(outcome)
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    device: DeviceInfo,
    Json(body): Json<SignInRequest>,
) -> ApiResult<TokenResponse> {
    body.validate()?;
    let services = ServiceContext::from_state(state.as_ref());
    let tokens = services
        .auth(&state.auth_providers)
        .login(&body.email, &body.password, &device)
        .await?;
    JsonApiResponse::ok(tokens.into())
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    device: DeviceInfo,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let services = ServiceContext::from_state(state.as_ref());
    let tokens = services
        .auth(&state.auth_providers)
        .refresh(&body.refresh_token, &device)
        .await?;
    JsonApiResponse::ok(tokens.into())
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    claims: AuthGuard,
) -> ApiResult<serde_json::Value> {
    let services = ServiceContext::from_state(state.as_ref());
    services
        .auth(&state.auth_providers)
        .sign_out(claims.session_id()?)
        .await?;
    JsonApiResponse::with_status(StatusCode::OK, "signed out", serde_json::Value::Null)
}
