use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        providers::local::normalize_email,
    },
    db::dao::{DaoBase, DaoLayerError, EMAIL_TAKEN, SessionDao, UserDao},
    db::entities::user,
    error::AppError,
    services::{UserView, avatar_service::AvatarService},
};

pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current: Option<String>,
    pub new: String,
    pub revoke_other_sessions: bool,
}

pub(crate) fn user_not_found(err: DaoLayerError) -> AppError {
    match err {
        DaoLayerError::NotFound { .. } => AppError::not_found("User not found"),
        other => other.into(),
    }
}

fn clean_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct UserService {
    user_dao: UserDao,
    session_dao: SessionDao,
    avatars: AvatarService,
}

impl UserService {
    pub fn new(user_dao: UserDao, session_dao: SessionDao, avatars: AvatarService) -> Self {
        Self {
            user_dao,
            session_dao,
            avatars,
        }
    }

    fn view(&self, model: user::Model) -> UserView {
        let image_url = self.avatars.avatar_url(model.image.as_deref());
        UserView::new(model, image_url)
    }

    pub async fn profile(&self, id: Uuid) -> Result<UserView, AppError> {
        let model = self.user_dao.find_by_id(id).await.map_err(user_not_found)?;
        Ok(self.view(model))
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<UserView, AppError> {
        let current = self.user_dao.find_by_id(id).await.map_err(user_not_found)?;

        let name = update.name.as_deref().map(clean_name).transpose()?;
        let email = match update.email.as_deref().map(normalize_email) {
            Some(email) if email.is_empty() => return Err(AppError::bad_request("Email required")),
            Some(email) if email != current.email => {
                if self.user_dao.find_by_email(&email).await?.is_some() {
                    return Err(AppError::conflict(EMAIL_TAKEN));
                }
                Some(email)
            }
            _ => None,
        };

        if name.is_none() && email.is_none() {
            return Ok(self.view(current));
        }

        let email_changed = email.is_some();
        let updated = self
            .user_dao
            .update_profile(id, name, email)
            .await
            .map_err(user_not_found)?;
        if email_changed {
            tracing::info!(user_id = %id, "email changed");
        }
        Ok(self.view(updated))
    }

    /// Returns how many other sessions were revoked.
    pub async fn change_password(
        &self,
        id: Uuid,
        change: PasswordChange,
        current_session: Uuid,
    ) -> Result<u64, AppError> {
        let user = self.user_dao.find_by_id(id).await.map_err(user_not_found)?;

        if let Some(hash) = user.password_hash.as_deref() {
            let current = change.current.as_deref().unwrap_or_default();
            if current.is_empty() || !verify_password(current, hash)? {
                return Err(AppError::unauthorized("Current password is incorrect"));
            }
        }

        let hash = hash_password(&change.new)?;
        self.user_dao.set_password_hash(id, hash).await?;
        tracing::info!(user_id = %id, "password changed");

        if !change.revoke_other_sessions {
            return Ok(0);
        }
        let revoked = self
            .session_dao
            .revoke_all_for_user(id, Some(current_session))
            .await?;
        tracing::info!(user_id = %id, revoked, "revoked other sessions after password change");
        Ok(revoked)
    }
}
