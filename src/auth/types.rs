use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    /// Registered but not yet approved by an admin. Cannot sign in.
    Pending,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::Pending];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Pending => "pending",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Role::Pending)
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "pending" => Ok(Role::Pending),
            _ => Err(()),
        }
    }
}

/// Claim roles for a stored role string. Admins also carry `User`.
pub fn roles_for(stored: &str) -> Vec<Role> {
    match Role::try_from(stored) {
        Ok(Role::Admin) => vec![Role::Admin, Role::User],
        Ok(Role::Pending) => Vec::new(),
        _ => vec![Role::User],
    }
}

pub trait RequiredRole {
    fn required() -> Role;

    fn rejection() -> AppError {
        AppError::forbidden("Missing required role")
    }
}

pub struct UserRole;

impl RequiredRole for UserRole {
    fn required() -> Role {
        Role::User
    }
}

pub struct AdminRole;

impl RequiredRole for AdminRole {
    fn required() -> Role {
        Role::Admin
    }

    // Admin routes are hidden rather than forbidden.
    fn rejection() -> AppError {
        AppError::not_found("Not found")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // user id
    pub sid: String, // session id
    pub exp: usize,
    pub iat: usize,
    pub roles: Vec<Role>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid token subject"))
    }

    pub fn session_id(&self) -> Result<Uuid, AppError> {
        self.sid
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid token session"))
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: usize,
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug)]
pub enum SignUpOutcome {
    SignedIn(TokenBundle),
    PendingApproval { user_id: Uuid },
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::{AdminRole, Claims, RequiredRole, Role, UserRole, roles_for};

    #[test]
    fn role_string_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::try_from(role.as_str()), Ok(role));
        }
        assert!(Role::try_from("manager").is_err());
    }

    #[test]
    fn only_pending_is_inactive() {
        assert!(Role::User.is_active());
        assert!(Role::Admin.is_active());
        assert!(!Role::Pending.is_active());
    }

    #[test]
    fn claim_roles_expand_admin_and_drop_pending() {
        assert_eq!(roles_for("admin"), vec![Role::Admin, Role::User]);
        assert_eq!(roles_for("user"), vec![Role::User]);
        assert_eq!(roles_for("manager"), vec![Role::User]);
        assert!(roles_for("pending").is_empty());
    }

    #[test]
    fn admin_guard_hides_route_while_user_guard_forbids() {
        assert_eq!(UserRole::required(), Role::User);
        assert_eq!(AdminRole::required(), Role::Admin);
        assert_eq!(UserRole::rejection().status(), StatusCode::FORBIDDEN);
        assert_eq!(AdminRole::rejection().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn claims_reject_malformed_ids() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            sid: uuid::Uuid::new_v4().to_string(),
            exp: 0,
            iat: 0,
            roles: vec![Role::User],
        };

        assert_eq!(claims.user_id().unwrap_err().status(), StatusCode::UNAUTHORIZED);
        assert!(claims.session_id().is_ok());
        assert!(claims.has_role(Role::User));
        assert!(!claims.has_role(Role::Admin));
    }
}
