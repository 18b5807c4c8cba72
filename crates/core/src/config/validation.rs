use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("Unable to load env file {}: {message}", path.display())]
    EnvFile { path: PathBuf, message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A plain, unquoted SQL identifier: letters, digits and underscores, not
/// starting with a digit. Optionally schema-qualified with a single dot.
pub fn is_plain_identifier(value: &str) -> bool {
    let part_ok = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let mut parts = value.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, None) => part_ok(table),
        (Some(schema), Some(table), None) => part_ok(schema) && part_ok(table),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers() {
        assert!(is_plain_identifier("schema_migrations"));
        assert!(is_plain_identifier("_private"));
        assert!(is_plain_identifier("public.schema_migrations"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("1migrations"));
        assert!(!is_plain_identifier("migrations; DROP TABLE users"));
        assert!(!is_plain_identifier("a.b.c"));
        assert!(!is_plain_identifier("\"quoted\""));
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::invalid_value("DB_PORT", "abc", "an integer port");
        assert_eq!(
            err.to_string(),
            "Invalid value for field 'DB_PORT': 'abc'. Expected: an integer port"
        );
    }
}
