use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(default_expr = "Expr::current_timestamp()")]
    pub updated_at: DateTimeWithTimeZone,
    #[sea_orm(unique)]
    pub token: String,
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    pub expires_at: DateTimeWithTimeZone,
    pub revoked: bool,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    #[sea_orm(belongs_to, from = "user_id", to = "id", on_delete = "Cascade")]
    pub user: HasOne<super::user::Entity>,
}

impl Model {
    pub fn is_active_at(&self, now: &DateTimeWithTimeZone) -> bool {
        !self.revoked && self.expires_at > *now
    }
}

impl ActiveModelBehavior for ActiveModel {}

crate::impl_base_entity!();
