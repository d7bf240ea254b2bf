//! Authentication and authorization for Quire
//!
//! Provides:
//! - JWT session and password-reset tokens
//! - Roles, permission levels and the authenticated `Actor`
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{
    extract_token_from_header, Claims, JwtValidator, TokenInput, TokenPurpose,
    TokenValidationResult,
};
pub use password::{hash_password, validate_password, verify_password};
pub use permissions::{Actor, PermissionLevel, Role};
