mod client;
mod github;
mod google;
mod registry;

use std::sync::Arc;

pub use client::{OAuthClient, OAuthEndpoints};
pub use github::GithubProvider;
pub use google::GoogleProvider;
pub use registry::{OAuthProfile, OAuthProvider, OAuthProviderId, OAuthProviders};

use crate::{config::OAuthConfig, error::AppError};

/// Registers a provider for each configured client.
pub fn build_oauth_providers(cfg: &OAuthConfig) -> Result<OAuthProviders, AppError> {
    let mut providers = OAuthProviders::new();
    if let Some(github) = &cfg.github {
        providers.add(Arc::new(GithubProvider::new(github)))?;
    }
    if let Some(google) = &cfg.google {
        providers.add(Arc::new(GoogleProvider::new(google)))?;
    }
    tracing::info!(providers = ?providers.ids(), "oauth providers ready");
    Ok(providers)
}
