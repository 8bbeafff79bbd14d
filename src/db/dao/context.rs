use sea_orm::DatabaseConnection;

use super::{AccountDao, DaoBase, OAuthStateDao, SessionDao, UserDao};

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        DaoBase::new(&self.db)
    }

    pub fn session(&self) -> SessionDao {
        DaoBase::new(&self.db)
    }

    pub fn account(&self) -> AccountDao {
        DaoBase::new(&self.db)
    }

    pub fn oauth_state(&self) -> OAuthStateDao {
        DaoBase::new(&self.db)
    }
}
