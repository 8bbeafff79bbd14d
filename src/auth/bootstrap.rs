use std::sync::Arc;

use crate::{config::AuthConfig, db::dao::DaoContext, error::AppError};

use super::{
    jwt::JwtKeys,
    providers::{AuthProviders, LocalAuthProvider, LocalAuthSettings},
};

pub fn build_providers(cfg: &AuthConfig, daos: &DaoContext) -> Result<AuthProviders, AppError> {
    let jwt = JwtKeys::from_secret(cfg.jwt_secret.as_bytes());
    let local = LocalAuthProvider::new(daos, jwt, LocalAuthSettings::from(cfg));
    let mut providers = AuthProviders::new(cfg.provider).with_provider(Arc::new(local))?;
    providers.set_active(cfg.provider)?;
    Ok(providers)
}

/// Builds the registry and seeds the configured admin account.
pub async fn init_providers(cfg: &AuthConfig, daos: &DaoContext) -> anyhow::Result<AuthProviders> {
    let providers = build_providers(cfg, daos)?;
    providers.active()?.seed_admin(cfg).await?;
    Ok(providers)
}
