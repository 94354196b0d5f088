//! Password hashing and verification using Argon2
//!
//! Hashes are stored in PHC format, so salt and parameters travel with them.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::GatehouseError;

/// Shortest password accepted at registration or change
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, GatehouseError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatehouseError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, GatehouseError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| GatehouseError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Reject passwords below the minimum length
pub fn check_password_length(password: &str) -> Result<(), GatehouseError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(GatehouseError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("kvs-secret").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("kvs-secret", &hash).unwrap());
        assert!(!verify_password("kvs-guess", &hash).unwrap());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("same-password", &hash1).unwrap());
        assert!(verify_password("same-password", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "not-a-valid-hash").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(check_password_length("12345").is_err());
        assert!(check_password_length("123456").is_ok());
    }
}
