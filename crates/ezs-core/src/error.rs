//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

impl DomainError {
    /// Creates an invalid field value error.
    pub fn invalid(field: &str, value: impl Into<String>, expected: &str) -> Self {
        Self::InvalidFieldValue {
            field: field.to_string(),
            value: value.into(),
            expected: expected.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display() {
        let err = DomainError::invalid("transaction_state", "Sleeping", "a known state");
        assert_eq!(
            err.to_string(),
            "Invalid transaction_state: Sleeping (expected a known state)"
        );
    }
}
