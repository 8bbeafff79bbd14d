use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, Order, QueryFilter,
    QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use super::account_dao::{ACCOUNT_TAKEN, account_model};
use super::{AccountDao, DaoBase, DaoLayerError, DaoResult, PaginatedResponse};
use crate::db::entities::{prelude::User, user};

pub const EMAIL_TAKEN: &str = "Email already registered";

#[derive(FromQueryResult)]
struct RoleCountRow {
    role: String,
    count: i64,
}

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn new_user_model(new: NewUser) -> user::ActiveModel {
    user::ActiveModel {
        email: Set(new.email),
        name: Set(new.name),
        password_hash: Set(new.password_hash),
        role: Set(new.role),
        email_verified: Set(new.email_verified),
        image: Set(None),
        last_sign_in_at: Set(None),
        ..Default::default()
    }
}

pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub email_verified: bool,
}

/// Narrowing applied to admin user listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Matched as a substring of email or name, case-insensitively.
    pub search: Option<String>,
    /// Empty means every role.
    pub roles: Vec<String>,
}

impl UserFilter {
    fn apply(self, query: Select<User>) -> Select<User> {
        let mut query = query;
        if !self.roles.is_empty() {
            query = query.filter(user::Column::Role.is_in(self.roles));
        }
        if let Some(search) = self.search {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Email)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Name)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }
        query
    }
}

pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl UserDao {
    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(DaoLayerError::Db)
    }

    pub async fn create_user(&self, new: NewUser) -> DaoResult<user::Model> {
        self.create(new_user_model(new))
            .await
            .map_err(|err| err.on_unique_violation(EMAIL_TAKEN))
    }

    /// Inserts the user and its OAuth account link in one transaction.
    pub async fn create_with_account(
        &self,
        new: NewUser,
        provider: &str,
        provider_account_id: &str,
    ) -> DaoResult<user::Model> {
        let txn = self.db.begin().await?;
        let created = Self::create_in(&txn, new_user_model(new))
            .await
            .map_err(|err| err.on_unique_violation(EMAIL_TAKEN))?;
        AccountDao::create_in(&txn, account_model(created.id, provider, provider_account_id))
            .await
            .map_err(|err| err.on_unique_violation(ACCOUNT_TAKEN))?;
        txn.commit().await?;
        Ok(created)
    }

    /// Applies the profile fields that are set. A new email resets
    /// `email_verified`.
    pub async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> DaoResult<user::Model> {
        self.update(id, move |active| {
            if let Some(name) = name {
                active.name = Set(name);
            }
            if let Some(email) = email {
                active.email = Set(email);
                active.email_verified = Set(false);
            }
        })
        .await
        .map_err(|err| err.on_unique_violation(EMAIL_TAKEN))
    }

    pub async fn set_role(&self, id: Uuid, role: &str) -> DaoResult<user::Model> {
        let role = role.to_string();
        self.update(id, move |active| {
            active.role = Set(role);
        })
        .await
    }

    pub async fn set_image(&self, id: Uuid, image: Option<String>) -> DaoResult<user::Model> {
        self.update(id, move |active| {
            active.image = Set(image);
        })
        .await
    }

    pub async fn set_password_hash(&self, id: Uuid, hash: String) -> DaoResult<user::Model> {
        self.update(id, move |active| {
            active.password_hash = Set(Some(hash));
        })
        .await
    }

    pub async fn set_last_sign_in(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::FixedOffset>,
    ) -> DaoResult<()> {
        self.update(id, move |active| {
            active.last_sign_in_at = Set(Some(at));
        })
        .await
        .map(|_| ())
    }

    /// Filtered page of users with the total count of matching rows.
    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: UserFilter,
        order: (user::Column, Order),
    ) -> DaoResult<PaginatedResponse<user::Model>> {
        let count_filter = filter.clone();
        let mut response = self
            .find(page, page_size, Some(order), move |query| filter.apply(query))
            .await?;
        let total = self.count(move |query| count_filter.apply(query)).await?;
        response.total = Some(total);
        Ok(response)
    }

    /// `(role, count)` for every stored role.
    pub async fn count_by_role(&self) -> DaoResult<Vec<(String, i64)>> {
        let rows = User::find()
            .select_only()
            .column(user::Column::Role)
            .column_as(user::Column::Id.count(), "count")
            .group_by(user::Column::Role)
            .into_model::<RoleCountRow>()
            .all(&self.db)
            .await
            .map_err(DaoLayerError::Db)?;
        Ok(rows.into_iter().map(|row| (row.role, row.count)).collect())
    }
}
