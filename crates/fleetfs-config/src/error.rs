//! Error types for configuration operations.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was absent.
    #[error("missing configuration value")]
    Missing {
        /// Environment variable name.
        name: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant() {
        assert_eq!(
            ConfigError::Missing { name: "X" }.to_string(),
            "missing configuration value"
        );
        assert_eq!(
            ConfigError::InvalidField {
                field: "reserved_space_mb",
                value: Some("abc".into()),
                reason: "not_a_number",
            }
            .to_string(),
            "invalid configuration field"
        );
    }
}
