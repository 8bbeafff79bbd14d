use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::{DaoBase, DaoLayerError, DaoResult};
use crate::db::entities::account::{self, Entity as Account};

#[derive(Clone)]
pub struct AccountDao {
    db: DatabaseConnection,
}

impl DaoBase for AccountDao {
    type Entity = Account;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub const ACCOUNT_TAKEN: &str = "OAuth account already linked";

pub(crate) fn account_model(
    user_id: Uuid,
    provider: &str,
    provider_account_id: &str,
) -> account::ActiveModel {
    account::ActiveModel {
        user_id: Set(user_id),
        provider: Set(provider.to_string()),
        provider_account_id: Set(provider_account_id.to_string()),
        ..Default::default()
    }
}

impl AccountDao {
    pub async fn find_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> DaoResult<Option<account::Model>> {
        Account::find()
            .filter(account::Column::Provider.eq(provider))
            .filter(account::Column::ProviderAccountId.eq(provider_account_id))
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> DaoResult<account::Model> {
        self.create(account_model(user_id, provider, provider_account_id))
            .await
            .map_err(|err| err.on_unique_violation(ACCOUNT_TAKEN))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use uuid::Uuid;

    use crate::db::entities::account;

    use super::AccountDao;
    use crate::db::dao::DaoBase;

    #[tokio::test]
    async fn find_by_provider_returns_linked_account() {
        let now = FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid");
        let user_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[account::Model {
                id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
                user_id,
                provider: "github".to_string(),
                provider_account_id: "42".to_string(),
            }]])
            .append_query_results([Vec::<account::Model>::new()])
            .into_connection();
        let dao = AccountDao::new(&db);

        let linked = dao
            .find_by_provider("github", "42")
            .await
            .expect("query should succeed");
        assert_eq!(linked.map(|a| a.user_id), Some(user_id));

        let missing = dao
            .find_by_provider("github", "43")
            .await
            .expect("query should succeed");
        assert!(missing.is_none());
    }
}
