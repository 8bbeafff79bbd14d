use axum::{
    body::{Bytes, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    response::{JsonApiResponse, log_app_error},
};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// Rewrites plain-text error bodies (extractor rejections, 404s from the
/// router fallback) into the JSON envelope.
pub async fn json_error_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if has_content_type(&response, |value| {
        value.contains("application/json") || value.contains("+json")
    }) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let message = match to_bytes(body, MAX_ERROR_BODY_BYTES).await {
        Ok(bytes) => body_bytes_to_message(status, bytes),
        Err(_) => default_message(status),
    };
    let app_error = AppError::from_status(status, message);
    if status.is_server_error() {
        log_app_error(&app_error, status);
    }

    let mut envelope = JsonApiResponse::from_error(&app_error);
    envelope.status = status.as_u16();
    let mut new_response = envelope.into_response();
    copy_headers(&parts.headers, &mut new_response);
    new_response
}

fn has_content_type(response: &Response, matches: impl Fn(&str) -> bool) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| matches(&value.to_ascii_lowercase()))
        .unwrap_or(false)
}

fn body_bytes_to_message(status: StatusCode, bytes: Bytes) -> String {
    let message = String::from_utf8_lossy(&bytes).trim().to_string();
    if message.is_empty() {
        return default_message(status);
    }
    message
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn copy_headers(src: &HeaderMap, dest: &mut Response) {
    for (name, value) in src {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        dest.headers_mut().insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{self, Body},
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::json_error_middleware;
    use crate::error::AppError;

    fn app() -> Router {
        Router::new()
            .route("/plain", get(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "too big") }))
            .route(
                "/json",
                get(|| async { AppError::conflict("Email already registered") }),
            )
            .route("/empty", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(json_error_middleware))
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn wraps_plain_text_errors_and_keeps_status() {
        let (status, json) = call("/plain").await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["status"], 413);
        assert_eq!(json["message"], "too big");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn leaves_json_errors_untouched() {
        let (status, json) = call("/json").await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Email already registered");
    }

    #[tokio::test]
    async fn empty_bodies_get_canonical_reason() {
        let (status, json) = call("/empty").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Not Found");
    }
}
