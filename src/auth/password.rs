//! Argon2id password hashing for account login

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::BailiffError;

/// Hash a password into a PHC string (salt and parameters included).
pub fn hash_password(password: &str) -> Result<String, BailiffError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BailiffError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a login password against a stored hash.
///
/// A stored hash that does not parse is a data problem, not a wrong password,
/// so it surfaces as an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, BailiffError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| BailiffError::Internal(format!("Stored password hash is malformed: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
