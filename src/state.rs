use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    auth::{oauth::OAuthProviders, providers::AuthProviders},
    config::AppConfig,
    storage::ObjectStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub auth_providers: AuthProviders,
    pub oauth_providers: OAuthProviders,
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        auth_providers: AuthProviders,
        oauth_providers: OAuthProviders,
        storage: Arc<dyn ObjectStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            auth_providers,
            oauth_providers,
            storage,
        })
    }
}
