use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    auth::{
        Claims, DeviceInfo, Role, SignUp, SignUpOutcome, TokenBundle,
        jwt::{JwtKeys, decode_token, encode_token, make_access_claims, random_token},
        password::{hash_password, verify_password},
        roles_for,
    },
    config::{AuthConfig, defaults},
    db::dao::{
        DaoBase, DaoContext, DaoLayerError, EMAIL_TAKEN, NewSession, NewUser, SessionDao, UserDao,
    },
    db::entities::user,
    error::AppError,
};

use super::{AuthProvider, AuthProviderId};

const REFRESH_TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, Copy)]
pub struct LocalAuthSettings {
    pub require_approval: bool,
    pub access_ttl_secs: usize,
    pub refresh_ttl_days: i64,
}

impl Default for LocalAuthSettings {
    fn default() -> Self {
        Self {
            require_approval: defaults::DEFAULT_REQUIRE_APPROVAL,
            access_ttl_secs: defaults::DEFAULT_ACCESS_TTL_SECS as usize,
            refresh_ttl_days: defaults::DEFAULT_REFRESH_TTL_DAYS,
        }
    }
}

impl From<&AuthConfig> for LocalAuthSettings {
    fn from(cfg: &AuthConfig) -> Self {
        Self {
            require_approval: cfg.require_approval,
            access_ttl_secs: cfg.access_ttl_secs as usize,
            refresh_ttl_days: cfg.refresh_ttl_days,
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("Invalid credentials")
}

fn pending_approval() -> AppError {
    AppError::forbidden("Account pending approval")
}

#[derive(Clone)]
pub struct LocalAuthProvider {
    user_dao: UserDao,
    session_dao: SessionDao,
    jwt: JwtKeys,
    settings: LocalAuthSettings,
}

impl LocalAuthProvider {
    pub fn new(daos: &DaoContext, jwt: JwtKeys, settings: LocalAuthSettings) -> Self {
        Self {
            user_dao: daos.user(),
            session_dao: daos.session(),
            jwt,
            settings,
        }
    }

    fn bundle(
        &self,
        user: &user::Model,
        session_id: Uuid,
        refresh_token: String,
    ) -> Result<TokenBundle, AppError> {
        let claims = make_access_claims(
            &user.id,
            &session_id,
            roles_for(&user.role),
            self.settings.access_ttl_secs,
        );
        Ok(TokenBundle {
            access_token: encode_token(&self.jwt, &claims)?,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.settings.access_ttl_secs,
        })
    }

    fn refresh_expiry(&self) -> chrono::DateTime<chrono::FixedOffset> {
        Utc::now().fixed_offset() + Duration::days(self.settings.refresh_ttl_days)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn id(&self) -> AuthProviderId {
        AuthProviderId::Local
    }

    async fn register(
        &self,
        sign_up: SignUp,
        device: &DeviceInfo,
    ) -> Result<SignUpOutcome, AppError> {
        let email = normalize_email(&sign_up.email);
        if email.is_empty() {
            return Err(AppError::bad_request("Email required"));
        }

        if self.user_dao.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict(EMAIL_TAKEN));
        }

        let password_hash = hash_password(&sign_up.password)?;
        let role = if self.settings.require_approval {
            Role::Pending
        } else {
            Role::User
        };
        let user = self
            .user_dao
            .create_user(NewUser {
                email,
                name: sign_up.name.trim().to_string(),
                password_hash: Some(password_hash),
                role: role.as_str().to_string(),
                email_verified: false,
            })
            .await?;
        tracing::info!(user_id = %user.id, role = role.as_str(), "user registered");

        if !role.is_active() {
            return Ok(SignUpOutcome::PendingApproval { user_id: user.id });
        }
        self.issue_session(&user, device)
            .await
            .map(SignUpOutcome::SignedIn)
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        let user = self
            .user_dao
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid_credentials)?;

        let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
        if !verify_password(password, hash)? {
            return Err(invalid_credentials());
        }
        if user.role == Role::Pending.as_str() {
            return Err(pending_approval());
        }

        self.user_dao
            .set_last_sign_in(user.id, Utc::now().fixed_offset())
            .await?;
        let bundle = self.issue_session(&user, device).await?;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok(bundle)
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        let session = self
            .session_dao
            .find_by_token(refresh_token)
            .await?
            .filter(|session| !session.revoked)
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        if session.expires_at <= Utc::now().fixed_offset() {
            return Err(AppError::unauthorized("Refresh token expired"));
        }

        let user = match self.user_dao.find_by_id(session.user_id).await {
            Ok(user) => user,
            Err(DaoLayerError::NotFound { .. }) => {
                return Err(AppError::unauthorized("Invalid refresh token"));
            }
            Err(err) => return Err(err.into()),
        };
        if user.role == Role::Pending.as_str() {
            return Err(pending_approval());
        }

        let token = random_token(REFRESH_TOKEN_LEN);
        let rotated = self
            .session_dao
            .rotate_token(
                session.id,
                refresh_token,
                token.clone(),
                self.refresh_expiry(),
                device.user_agent.clone(),
                device.ip_address.clone(),
            )
            .await?;
        if !rotated {
            // Another request rotated or revoked it first.
            return Err(AppError::unauthorized("Invalid refresh token"));
        }
        self.bundle(&user, session.id, token)
    }

    async fn verify(&self, access_token: &str) -> Result<Claims, AppError> {
        let claims = decode_token(&self.jwt, access_token)?;
        let user_id = claims.user_id()?;
        let session_id = claims.session_id()?;

        let session = match self.session_dao.find_by_id(session_id).await {
            Ok(session) => session,
            Err(DaoLayerError::NotFound { .. }) => {
                return Err(AppError::unauthorized("Session revoked"));
            }
            Err(err) => return Err(err.into()),
        };
        if session.user_id != user_id || !session.is_active_at(&Utc::now().fixed_offset()) {
            return Err(AppError::unauthorized("Session revoked"));
        }
        Ok(claims)
    }

    async fn issue_session(
        &self,
        user: &user::Model,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        if user.role == Role::Pending.as_str() {
            return Err(pending_approval());
        }

        let session = self
            .session_dao
            .create_session(NewSession {
                user_id: user.id,
                token: random_token(REFRESH_TOKEN_LEN),
                expires_at: self.refresh_expiry(),
                user_agent: device.user_agent.clone(),
                ip_address: device.ip_address.clone(),
            })
            .await?;
        tracing::debug!(user_id = %user.id, session_id = %session.id, "session opened");
        self.bundle(user, session.id, session.token)
    }

    async fn sign_out(&self, session_id: Uuid) -> Result<(), AppError> {
        if self.session_dao.revoke(session_id).await? {
            tracing::info!(session_id = %session_id, "session signed out");
        }
        Ok(())
    }

    async fn seed_admin(&self, cfg: &AuthConfig) -> anyhow::Result<()> {
        let email = normalize_email(&cfg.admin_email);
        if let Some(existing) = self.user_dao.find_by_email(&email).await? {
            tracing::info!(user_id = %existing.id, "admin user already present");
            return Ok(());
        }

        let hash = hash_password(&cfg.admin_password)
            .map_err(|err| anyhow::anyhow!("admin seed hash error: {err}"))?;
        let user = self
            .user_dao
            .create_user(NewUser {
                email,
                name: "Administrator".to_string(),
                password_hash: Some(hash),
                role: Role::Admin.as_str().to_string(),
                email_verified: true,
            })
            .await?;
        tracing::info!(user_id = %user.id, "seeded admin user");
        Ok(())
    }
}
