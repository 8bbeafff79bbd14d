use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub updated_at: DateTimeWithTimeZone,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    /// `None` for accounts that only sign in through OAuth.
    pub password_hash: Option<String>,
    #[sea_orm(indexed)]
    pub role: String,
    pub email_verified: bool,
    /// Object-storage key of the avatar.
    pub image: Option<String>,
    pub last_sign_in_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(has_many)]
    pub sessions: HasMany<super::session::Entity>,
    #[sea_orm(has_many)]
    pub accounts: HasMany<super::account::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

crate::impl_base_entity!();
