//! Password hashing.
//!
//! Argon2id with a fresh random salt per password, stored in PHC string
//! format so parameters travel with the hash.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;

use crate::error::AuthError;

/// Hash a plaintext password for storage.
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] if the hasher fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash {
            reason: e.to_string(),
        })
}

/// Check a plaintext password against a stored hash.
///
/// Returns `Ok(false)` for a wrong password.
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] if the stored hash is unparseable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::PasswordHash {
        reason: format!("invalid stored hash: {e}"),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_an_error_not_a_mismatch() {
        assert!(matches!(
            verify_password("pw", "plaintext"),
            Err(AuthError::PasswordHash { .. })
        ));
    }
}
