use uuid::Uuid;

use crate::{
    auth::{Claims, DeviceInfo, SignUp, SignUpOutcome, TokenBundle, providers::AuthProviders},
    db::entities::user,
    error::AppError,
};

/// Routes credential operations to the active provider.
#[derive(Clone, Copy)]
pub struct AuthService<'a> {
    providers: &'a AuthProviders,
}

impl<'a> AuthService<'a> {
    pub fn new(providers: &'a AuthProviders) -> Self {
        Self { providers }
    }

    pub async fn register(
        &self,
        sign_up: SignUp,
        device: &DeviceInfo,
    ) -> Result<SignUpOutcome, AppError> {
        self.providers.active()?.register(sign_up, device).await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        self.providers.active()?.login(email, password, device).await
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        self.providers.active()?.refresh(refresh_token, device).await
    }

    pub async fn verify(&self, access_token: &str) -> Result<Claims, AppError> {
        self.providers.active()?.verify(access_token).await
    }

    pub async fn issue_session(
        &self,
        user: &user::Model,
        device: &DeviceInfo,
    ) -> Result<TokenBundle, AppError> {
        self.providers.active()?.issue_session(user, device).await
    }

    pub async fn sign_out(&self, session_id: Uuid) -> Result<(), AppError> {
        self.providers.active()?.sign_out(session_id).await
    }
}
