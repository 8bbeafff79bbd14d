use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

use super::{OAuthClient, OAuthEndpoints, OAuthProfile, OAuthProvider, OAuthProviderId};
use crate::config::OAuthClientConfig;

const SCOPE: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

pub struct GoogleProvider {
    client: OAuthClient,
}

impl GoogleProvider {
    pub fn new(cfg: &OAuthClientConfig) -> Self {
        let endpoints = OAuthEndpoints {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://openidconnect.googleapis.com".to_string(),
        };
        Self {
            client: OAuthClient::new(cfg, endpoints),
        }
    }
}

fn into_profile(info: UserInfo) -> Result<OAuthProfile> {
    let email = info
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| anyhow!("google userinfo has no email"))?;
    Ok(OAuthProfile {
        provider_account_id: info.sub,
        name: info.name.unwrap_or_default(),
        email,
        email_verified: info.email_verified,
    })
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn id(&self) -> OAuthProviderId {
        OAuthProviderId::Google
    }

    fn authorize_url(&self, state: &str) -> String {
        self.client.authorize_url(SCOPE, state)
    }

    async fn fetch_profile(&self, code: &str) -> Result<OAuthProfile> {
        let token = self.client.exchange_code(code).await?;
        let info: UserInfo = self
            .client
            .get_json(&self.client.api_url("/v1/userinfo"), &token)
            .await?;
        into_profile(info)
    }
}
