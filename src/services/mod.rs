pub mod admin_service;
pub mod auth_service;
pub mod avatar_service;
pub mod context;
pub mod oauth_service;
pub mod session_service;
pub mod user_service;
mod views;

pub use context::{ServiceContext, ServiceSettings};
pub use views::{SessionView, UserView};
