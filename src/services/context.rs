use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{
    auth::{oauth::OAuthProviders, providers::AuthProviders},
    config::{AppConfig, defaults},
    db::dao::DaoContext,
    services::{
        admin_service::AdminService, auth_service::AuthService, avatar_service::AvatarService,
        oauth_service::OAuthService, session_service::SessionService, user_service::UserService,
    },
    state::AppState,
    storage::ObjectStore,
};

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub require_approval: bool,
    pub presign_ttl: Duration,
    pub max_avatar_bytes: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            require_approval: defaults::DEFAULT_REQUIRE_APPROVAL,
            presign_ttl: Duration::from_secs(defaults::DEFAULT_PRESIGN_TTL_SECS as u64),
            max_avatar_bytes: defaults::DEFAULT_MAX_AVATAR_BYTES as usize,
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            require_approval: cfg.require_approval(),
            presign_ttl: Duration::from_secs(cfg.storage.presign_ttl_secs),
            max_avatar_bytes: cfg.storage.max_avatar_bytes,
        }
    }
}

#[derive(Clone)]
pub struct ServiceContext {
    daos: DaoContext,
    storage: Arc<dyn ObjectStore>,
    settings: ServiceSettings,
}

impl ServiceContext {
    pub fn new(
        db: &DatabaseConnection,
        storage: Arc<dyn ObjectStore>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            daos: DaoContext::new(db),
            storage,
            settings,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            &state.db,
            state.storage.clone(),
            ServiceSettings::from(&state.config),
        )
    }

    pub fn daos(&self) -> &DaoContext {
        &self.daos
    }

    pub fn avatar(&self) -> AvatarService {
        AvatarService::new(
            self.daos.user(),
            self.storage.clone(),
            self.settings.presign_ttl,
            self.settings.max_avatar_bytes,
        )
    }

    pub fn user(&self) -> UserService {
        UserService::new(self.daos.user(), self.daos.session(), self.avatar())
    }

    pub fn session(&self) -> SessionService {
        SessionService::new(self.daos.session())
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.daos.user(), self.daos.session(), self.avatar())
    }

    pub fn auth<'a>(&self, providers: &'a AuthProviders) -> AuthService<'a> {
        AuthService::new(providers)
    }

    pub fn oauth<'a>(
        &self,
        oauth: &'a OAuthProviders,
        auth: &'a AuthProviders,
    ) -> OAuthService<'a> {
        OAuthService::new(oauth, auth, &self.daos, self.settings.require_approval)
    }
}
