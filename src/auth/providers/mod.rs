pub mod local;
mod registry;

pub use local::{LocalAuthProvider, LocalAuthSettings};
pub use registry::{AuthProvider, AuthProviderId, AuthProviders};
