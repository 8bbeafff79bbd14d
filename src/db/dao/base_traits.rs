pub trait HasOrderColumns: sea_orm::EntityTrait {
    fn id_column() -> Self::Column;
    fn created_at_column() -> Self::Column;
}

pub trait HasIdActiveModel {
    fn set_id(&mut self, id: uuid::Uuid);
}

pub trait TimestampedActiveModel {
    fn set_created_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone);
    fn set_updated_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone);
}

/// Implements the DAO traits for an entity module whose model has `id`,
/// `created_at` and `updated_at` columns. Invoke inside the entity module.
#[macro_export]
macro_rules! impl_base_entity {
    () => {
        impl $crate::db::dao::base_traits::HasIdActiveModel for ActiveModel {
            fn set_id(&mut self, id: uuid::Uuid) {
                self.id = sea_orm::ActiveValue::Set(id);
            }
        }

        impl $crate::db::dao::base_traits::TimestampedActiveModel for ActiveModel {
            fn set_created_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone) {
                self.created_at = sea_orm::ActiveValue::Set(ts);
            }

            fn set_updated_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone) {
                self.updated_at = sea_orm::ActiveValue::Set(ts);
            }
        }

        impl $crate::db::dao::base_traits::HasOrderColumns for Entity {
            fn id_column() -> Column {
                Column::Id
            }

            fn created_at_column() -> Column {
                Column::CreatedAt
            }
        }
    };
}
