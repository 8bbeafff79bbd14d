use chrono::{DateTime, FixedOffset};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::oauth_state::{self, Entity as OAuthState};

#[derive(Clone)]
pub struct OAuthStateDao {
    db: DatabaseConnection,
}

impl DaoBase for OAuthStateDao {
    type Entity = OAuthState;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl OAuthStateDao {
    pub async fn create_state(
        &self,
        state: &str,
        provider: &str,
        expires_at: DateTime<FixedOffset>,
    ) -> DaoResult<oauth_state::Model> {
        let model = oauth_state::ActiveModel {
            state: Set(state.to_string()),
            provider: Set(provider.to_string()),
            expires_at: Set(expires_at),
            ..Default::default()
        };
        self.create(model).await
    }

    /// Drops states that expired before `now`. Returns how many were removed.
    pub async fn delete_expired(&self, now: DateTime<FixedOffset>) -> DaoResult<u64> {
        let result = OAuthState::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(result.rows_affected)
    }

    /// Removes the state row and returns it if it belongs to `provider` and
    /// has not expired. A state can be consumed once.
    pub async fn consume(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<FixedOffset>,
    ) -> DaoResult<Option<oauth_state::Model>> {
        let Some(found) = OAuthState::find()
            .filter(oauth_state::Column::State.eq(state))
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)?
        else {
            return Ok(None);
        };

        let result = OAuthState::delete_by_id(found.id)
            .exec(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        if result.rows_affected == 0 {
            // Consumed concurrently.
            return Ok(None);
        }

        if found.provider != provider || found.expires_at <= now {
            return Ok(None);
        }
        Ok(Some(found))
    }
}
