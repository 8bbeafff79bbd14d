use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

use super::{OAuthClient, OAuthEndpoints, OAuthProfile, OAuthProvider, OAuthProviderId};
use crate::config::OAuthClientConfig;

const SCOPE: &str = "read:user user:email";

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub struct GithubProvider {
    client: OAuthClient,
}

impl GithubProvider {
    pub fn new(cfg: &OAuthClientConfig) -> Self {
        let endpoints = OAuthEndpoints {
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            api_base: "https://api.github.com".to_string(),
        };
        Self {
            client: OAuthClient::new(cfg, endpoints),
        }
    }
}

/// Picks the address to sign in with and whether GitHub verified it. The
/// public profile email wins; otherwise the primary verified address.
fn resolve_email(public: Option<String>, emails: &[GithubEmail]) -> Option<(String, bool)> {
    if let Some(public) = public.filter(|email| !email.is_empty()) {
        let verified = emails
            .iter()
            .any(|entry| entry.verified && entry.email.eq_ignore_ascii_case(&public));
        return Some((public, verified));
    }
    emails
        .iter()
        .find(|entry| entry.primary && entry.verified)
        .map(|entry| (entry.email.clone(), true))
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn id(&self) -> OAuthProviderId {
        OAuthProviderId::Github
    }

    fn authorize_url(&self, state: &str) -> String {
        self.client.authorize_url(SCOPE, state)
    }

    async fn fetch_profile(&self, code: &str) -> Result<OAuthProfile> {
        let token = self.client.exchange_code(code).await?;
        let user: GithubUser = self.client.get_json(&self.client.api_url("/user"), &token).await?;

        let emails: Vec<GithubEmail> = match self
            .client
            .get_json(&self.client.api_url("/user/emails"), &token)
            .await
        {
            Ok(emails) => emails,
            Err(err) if user.email.is_some() => {
                tracing::warn!(error = %err, "github email lookup failed");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let (email, email_verified) = resolve_email(user.email, &emails)
            .ok_or_else(|| anyhow!("github account has no verified primary email"))?;

        Ok(OAuthProfile {
            provider_account_id: user.id.to_string(),
            email,
            name: user.name.filter(|name| !name.is_empty()).unwrap_or(user.login),
            email_verified,
        })
    }
}
