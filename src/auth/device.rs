use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

const MAX_FIELD_LEN: usize = 512;

/// Client metadata recorded on each session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = header_value(headers, header::USER_AGENT.as_str());
        let ip_address = header_value(headers, "x-forwarded-for")
            .and_then(|value| value.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty())
            .or_else(|| header_value(headers, "x-real-ip"));

        Self {
            user_agent: user_agent.map(truncate),
            ip_address: ip_address.map(truncate),
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn truncate(mut value: String) -> String {
    if value.len() > MAX_FIELD_LEN {
        let mut cut = MAX_FIELD_LEN;
        while !value.is_char_boundary(cut) {
            cut -= 1;
        }
        value.truncate(cut);
    }
    value
}

impl<S> FromRequestParts<S> for DeviceInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
