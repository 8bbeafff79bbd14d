use axum::{Router, routing::get};
use serde::Serialize;

use crate::response::{ApiResult, JsonApiResponse};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> ApiResult<Health> {
    JsonApiResponse::ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
