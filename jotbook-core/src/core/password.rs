//! Password hashing and verification with Argon2id.
//!
//! Registered users never have their password written to the store. Sign-up and
//! profile updates store the PHC string returned by [`hash_password`]
//! (`$argon2id$v=19$m=19456,t=2,p=1$...`), and sign-in checks candidates with
//! [`verify_password`].

use crate::{JotbookError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hashes `password` with a fresh random salt. Returns a PHC-format string.
///
/// # Errors
///
/// Returns [`JotbookError::PasswordHash`] if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| JotbookError::PasswordHash(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC-format hash.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns [`JotbookError::PasswordHash`] if `hash` is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| JotbookError::PasswordHash(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
