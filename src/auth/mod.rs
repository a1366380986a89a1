//! Authentication for the bridge
//!
//! Provides:
//! - Password hashing with Argon2
//! - JWT session-credential issuance and validation
//! - Registration and login flows

pub mod jwt;
pub mod password;
pub mod service;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use service::{AuthOutcome, AuthService, SessionGrant, AUTH_FAILED_MESSAGE};
