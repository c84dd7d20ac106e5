//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService, TokenError, VerifiedToken};
pub use middleware::{
    extract_token, jwt_auth_middleware, require_roles, AuthContext, AuthGate, RequiredRoles,
};
pub use password::{HashCost, PasswordHasher};
