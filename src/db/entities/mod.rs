#[allow(unused_imports)]
pub mod prelude {
    pub use super::account::Entity as Account;
    pub use super::oauth_state::Entity as OAuthState;
    pub use super::session::Entity as Session;
    pub use super::user::Entity as User;
}

pub mod account;
pub mod oauth_state;
pub mod session;
pub mod user;
