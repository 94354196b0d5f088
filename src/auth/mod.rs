//! Authentication for Gatehouse
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - Resolution of request credentials into a policy principal

pub mod jwt;
pub mod password;
pub mod principal;

pub use jwt::{
    extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator, TokenInput,
    TokenValidationResult, AUTH_COOKIE, DEFAULT_EXPIRY_SECONDS,
};
pub use password::{check_password_length, hash_password, verify_password, MIN_PASSWORD_LEN};
pub use principal::{principal_from_claims, resolve_principal, verified_claims, Credentials};
