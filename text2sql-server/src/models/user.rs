//! Account credentials: usernames, passwords and stored password hashes

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::ValidationError;

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 256;

const HASH_PREFIX: &str = "sha256";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("invalid username regex"));

/// Validated login name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }
        if s.len() < MIN_USERNAME_LEN {
            return Err(ValidationError::TooShort {
                field: "username",
                min: MIN_USERNAME_LEN,
            });
        }
        if s.len() > MAX_USERNAME_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: MAX_USERNAME_LEN,
            });
        }
        if !USERNAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "only letters, digits, '_', '-' and '.' are allowed",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plain-text password accepted for registration
pub struct Password(String);

impl Password {
    /// Validate a new password and its optional confirmation.
    pub fn new(password: &str, confirmation: Option<&str>) -> Result<Self, ValidationError> {
        if password.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        if let Some(confirmation) = confirmation {
            if confirmation != password {
                return Err(ValidationError::Mismatch {
                    field: "password confirmation",
                });
            }
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if password.chars().count() > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(Self(password.to_owned()))
    }

    pub fn hash(&self) -> PasswordHash {
        PasswordHash::generate(&self.0)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Stored form of a password: `sha256$<salt>$<hex digest of salt + password>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    fn generate(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest(&salt, password);
        Self(format!("{HASH_PREFIX}${salt}${digest}"))
    }

    /// Wrap a value read back from the store.
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare a candidate password against the stored hash.
    pub fn verify(&self, password: &str) -> bool {
        let mut parts = self.0.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(HASH_PREFIX), Some(salt), Some(expected)) => digest(salt, password) == expected,
            _ => false,
        }
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_usernames() {
        assert!(Username::new("alice").is_ok());
        assert!(Username::new("bob_99").is_ok());
        assert!(Username::new("j.doe-1").is_ok());
    }

    #[test]
    fn invalid_usernames() {
        assert!(matches!(
            Username::new("").unwrap_err(),
            ValidationError::Empty { .. }
        ));
        assert!(matches!(
            Username::new("ab").unwrap_err(),
            ValidationError::TooShort { min: 3, .. }
        ));
        assert!(matches!(
            Username::new("has space").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
        assert!(Username::new(&"x".repeat(33)).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(Password::new("secret1", None).is_ok());
        assert!(Password::new("secret1", Some("secret1")).is_ok());

        assert!(matches!(
            Password::new("short", None).unwrap_err(),
            ValidationError::TooShort { min: 6, .. }
        ));
        assert!(matches!(
            Password::new("secret1", Some("secret2")).unwrap_err(),
            ValidationError::Mismatch { .. }
        ));
    }

    #[test]
    fn password_debug_is_masked() {
        let password = Password::new("hunter22", None).unwrap();
        assert_eq!(format!("{:?}", password), "Password(***)");
    }

    #[test]
    fn hash_verifies() {
        let hash = Password::new("correct horse", None).unwrap().hash();
        assert!(hash.as_str().starts_with("sha256$"));
        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("wrong horse"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = Password::new("same-password", None).unwrap().hash();
        let b = Password::new("same-password", None).unwrap().hash();
        assert_ne!(a, b);
        assert!(a.verify("same-password"));
        assert!(b.verify("same-password"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!PasswordHash::from_stored("plaintext").verify("plaintext"));
        assert!(!PasswordHash::from_stored("md5$salt$abc").verify("x"));
    }
}
