//! Account helpers for the email/password sign-up path.
//!
//! The auth provider owns the credential; the mirrored profile row keeps an
//! Argon2id PHC string alongside it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};

use crate::error::{Error, Result};

/// Reject malformed sign-up input before anything reaches the provider.
///
/// An email needs exactly one `@` with non-empty text on both sides.
pub fn validate_credentials(email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        _ => false,
    };
    if !valid {
        return Err(Error::BadRequest("Invalid email address".to_string()));
    }
    if password.is_empty() {
        return Err(Error::BadRequest("Password must not be empty".to_string()));
    }
    Ok(())
}

/// Username derived from the local part of an email.
pub fn derive_username(email: &str) -> String {
    email
        .split_once('@')
        .map(|(local, _)| local)
        .unwrap_or(email)
        .to_string()
}

/// Hash a password with Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn test_validate_accepts_plain_address() {
        assert!(validate_credentials("ada@example.org", "pw").is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_at() {
        let err = validate_credentials("ada.example.org", "pw").unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_validate_rejects_two_ats() {
        assert!(validate_credentials("a@b@c", "pw").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_parts() {
        assert!(validate_credentials("@example.org", "pw").is_err());
        assert!(validate_credentials("ada@", "pw").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_password() {
        let err = validate_credentials("ada@example.org", "").unwrap_err();
        assert_eq!(err.detail(), "Password must not be empty");
    }

    #[test]
    fn test_derive_username() {
        assert_eq!(derive_username("ada.lovelace@example.org"), "ada.lovelace");
        assert_eq!(derive_username("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_hash_password_is_phc_and_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse", &parsed)
            .is_ok());
    }

    #[test]
    fn test_hash_password_is_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
