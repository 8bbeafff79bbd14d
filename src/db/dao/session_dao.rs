use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::session::{self, Entity as Session};

#[derive(Clone)]
pub struct SessionDao {
    db: DatabaseConnection,
}

impl DaoBase for SessionDao {
    type Entity = Session;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub struct NewSession {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<FixedOffset>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl SessionDao {
    pub async fn create_session(&self, new: NewSession) -> DaoResult<session::Model> {
        let model = session::ActiveModel {
            token: Set(new.token),
            user_id: Set(new.user_id),
            expires_at: Set(new.expires_at),
            revoked: Set(false),
            user_agent: Set(new.user_agent),
            ip_address: Set(new.ip_address),
            ..Default::default()
        };
        self.create(model).await
    }

    /// Looks up a session by refresh token regardless of state.
    pub async fn find_by_token(&self, token: &str) -> DaoResult<Option<session::Model>> {
        Session::find()
            .filter(session::Column::Token.eq(token))
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> DaoResult<Option<session::Model>> {
        Session::find_by_id(id)
            .filter(session::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }

    /// Swaps `current` for `token` on a live session; the session id stays.
    /// Device fields are only overwritten when the new request carries them.
    /// Returns false when the token was already rotated or revoked.
    pub async fn rotate_token(
        &self,
        id: Uuid,
        current: &str,
        token: String,
        expires_at: DateTime<FixedOffset>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> DaoResult<bool> {
        let mut query = Session::update_many()
            .col_expr(session::Column::Token, Expr::value(token))
            .col_expr(session::Column::ExpiresAt, Expr::value(expires_at))
            .col_expr(session::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()));
        if let Some(user_agent) = user_agent {
            query = query.col_expr(session::Column::UserAgent, Expr::value(user_agent));
        }
        if let Some(ip_address) = ip_address {
            query = query.col_expr(session::Column::IpAddress, Expr::value(ip_address));
        }
        let result = query
            .filter(session::Column::Id.eq(id))
            .filter(session::Column::Token.eq(current))
            .filter(session::Column::Revoked.eq(false))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected > 0)
    }

    /// Returns whether a live session was revoked.
    pub async fn revoke(&self, id: Uuid) -> DaoResult<bool> {
        let result = Session::update_many()
            .col_expr(session::Column::Revoked, Expr::value(true))
            .col_expr(session::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(session::Column::Id.eq(id))
            .filter(session::Column::Revoked.eq(false))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected > 0)
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid, except: Option<Uuid>) -> DaoResult<u64> {
        let mut query = Session::update_many()
            .col_expr(session::Column::Revoked, Expr::value(true))
            .col_expr(session::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(session::Column::UserId.eq(user_id))
            .filter(session::Column::Revoked.eq(false));
        if let Some(keep) = except {
            query = query.filter(session::Column::Id.ne(keep));
        }
        let result = query.exec(&self.db).await.map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }

    pub async fn list_active_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<FixedOffset>,
    ) -> DaoResult<Vec<session::Model>> {
        Session::find()
            .filter(session::Column::UserId.eq(user_id))
            .filter(session::Column::Revoked.eq(false))
            .filter(session::Column::ExpiresAt.gt(now))
            .order_by_desc(session::Column::UpdatedAt)
            .all(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn count_active(&self, now: DateTime<FixedOffset>) -> DaoResult<u64> {
        Session::find()
            .filter(session::Column::Revoked.eq(false))
            .filter(session::Column::ExpiresAt.gt(now))
            .count(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }
}
