pub mod bootstrap;
pub mod device;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod providers;
mod types;

pub use device::DeviceInfo;
pub use types::{
    AdminRole, Claims, RequiredRole, Role, SignUp, SignUpOutcome, TokenBundle, UserRole,
    roles_for,
};
