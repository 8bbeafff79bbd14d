pub mod admin;
pub mod auth;
pub mod avatar;
pub mod me;
pub mod oauth;
pub mod payloads;
pub mod public;
mod router;
pub mod sessions;

pub use router::router;
