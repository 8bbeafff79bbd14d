pub mod account_dao;
pub mod base;
pub mod base_traits;
mod context;
pub mod error;
pub mod oauth_state_dao;
pub mod session_dao;
pub mod user_dao;

pub use account_dao::AccountDao;
pub use base::{DaoBase, PaginatedResponse};
pub use base_traits::{HasIdActiveModel, HasOrderColumns, TimestampedActiveModel};
pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use oauth_state_dao::OAuthStateDao;
pub use session_dao::{NewSession, SessionDao};
pub use user_dao::{EMAIL_TAKEN, NewUser, UserDao, UserFilter};
