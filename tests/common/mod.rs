#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{self, Body},
    http::{Request, Response},
    middleware,
};
use chrono::{Duration, Utc};
use sea_orm::MockDatabase;
use uuid::Uuid;

use admin_dashboard::{
    auth::{
        Role,
        bootstrap::build_providers,
        jwt::{JwtKeys, encode_token, make_access_claims},
        oauth::OAuthProviders,
        providers::AuthProviderId,
    },
    config::{AppConfig, AuthConfig},
    db::{
        dao::DaoContext,
        entities::{session, user},
    },
    middleware::{catch_panic_layer, json_error_middleware},
    routes::router,
    state::AppState,
    storage::MemoryStore,
};

pub const SECRET: &str = "integration-test-secret";

pub fn app(mock: MockDatabase) -> Router {
    let db = mock.into_connection();
    let mut cfg = AppConfig::default();
    let auth = AuthConfig {
        provider: AuthProviderId::Local,
        jwt_secret: SECRET.to_string(),
        admin_email: "admin@example.com".to_string(),
        admin_password: "admin-password".to_string(),
        require_approval: true,
        access_ttl_secs: 900,
        refresh_ttl_days: 30,
    };
    let providers =
        build_providers(&auth, &DaoContext::new(&db)).expect("auth providers should build");
    cfg.auth = Some(auth);

    let state = AppState::new(
        cfg,
        db,
        providers,
        OAuthProviders::new(),
        Arc::new(MemoryStore::new("avatars")),
    );
    Router::new()
        .merge(router(state))
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
}

pub fn token(user_id: Uuid, session_id: Uuid, roles: Vec<Role>) -> String {
    let claims = make_access_claims(&user_id, &session_id, roles, 300);
    encode_token(&JwtKeys::from_secret(SECRET.as_bytes()), &claims).expect("token should encode")
}

pub fn session_row(id: Uuid, user_id: Uuid, revoked: bool) -> session::Model {
    let now = Utc::now().fixed_offset();
    session::Model {
        id,
        created_at: now,
        updated_at: now,
        token: format!("refresh-{id}"),
        user_id,
        expires_at: now + Duration::days(30),
        revoked,
        user_agent: None,
        ip_address: None,
    }
}

pub fn user_row(id: Uuid, email: &str, role: &str, password_hash: Option<String>) -> user::Model {
    let now = Utc::now().fixed_offset();
    user::Model {
        id,
        created_at: now,
        updated_at: now,
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash,
        role: role.to_string(),
        email_verified: true,
        image: None,
        last_sign_in_at: None,
    }
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn json_request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    payload: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("request should build")
}

pub async fn json_body(res: Response<Body>) -> serde_json::Value {
    let bytes = body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be json")
}
