//! Registered database name validation

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MAX_DATABASE_NAME_LEN: usize = 64;

/// Starts with alphanumeric; then alphanumerics, spaces, `_`, `-`, `.`
static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.\-]*$").expect("invalid database name regex")
});

/// Display name of a registered user database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Create a database name; surrounding whitespace is trimmed.
    ///
    /// # Example
    /// ```
    /// use text2sql_server::models::DatabaseName;
    ///
    /// assert!(DatabaseName::new("employees").is_ok());
    /// assert!(DatabaseName::new("Sales DB 2024").is_ok());
    /// assert!(DatabaseName::new("_hidden").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "db_name" });
        }

        if s.chars().count() > MAX_DATABASE_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "db_name",
                max: MAX_DATABASE_NAME_LEN,
            });
        }

        if !NAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "db_name",
                reason: "must start with a letter or digit and contain only letters, digits, spaces, '_', '-' or '.'",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DatabaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(DatabaseName::new("employees").is_ok());
        assert!(DatabaseName::new("sales_2024").is_ok());
        assert!(DatabaseName::new("Prod Replica").is_ok());
        assert!(DatabaseName::new("v1.2-backup").is_ok());
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(DatabaseName::new("  hr  ").unwrap().as_str(), "hr");
    }

    #[test]
    fn rejects_empty() {
        let err = DatabaseName::new("   ").unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));
    }

    #[test]
    fn rejects_bad_characters() {
        let err = DatabaseName::new("drop;table").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
        assert!(DatabaseName::new("-leading").is_err());
    }

    #[test]
    fn max_length() {
        assert!(DatabaseName::new(&"a".repeat(64)).is_ok());
        let err = DatabaseName::new(&"a".repeat(65)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 64, .. }));
    }
}
