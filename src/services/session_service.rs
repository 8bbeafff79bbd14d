use chrono::Utc;
use uuid::Uuid;

use crate::{db::dao::SessionDao, error::AppError, services::SessionView};

#[derive(Clone)]
pub struct SessionService {
    session_dao: SessionDao,
}

impl SessionService {
    pub fn new(session_dao: SessionDao) -> Self {
        Self { session_dao }
    }

    /// Live sessions of a user, most recently used first.
    pub async fn list_active(
        &self,
        user_id: Uuid,
        current: Option<Uuid>,
    ) -> Result<Vec<SessionView>, AppError> {
        let sessions = self
            .session_dao
            .list_active_for_user(user_id, Utc::now().fixed_offset())
            .await?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionView::new(session, current))
            .collect())
    }

    pub async fn revoke(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        self.session_dao
            .find_for_user(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        self.session_dao.revoke(session_id).await?;
        tracing::info!(user_id = %user_id, session_id = %session_id, "session revoked");
        Ok(())
    }

    pub async fn revoke_all(&self, user_id: Uuid, except: Option<Uuid>) -> Result<u64, AppError> {
        let revoked = self.session_dao.revoke_all_for_user(user_id, except).await?;
        tracing::info!(user_id = %user_id, revoked, "sessions revoked");
        Ok(revoked)
    }
}
