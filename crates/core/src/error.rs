//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation, rule
/// violations, stock shortfalls). None of these are control flow: every
/// instance aborts the command and rolls back its unit of work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or non-positive input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule was violated (wrong state, same source/destination,
    /// exceeding pending quantity, ...).
    #[error("domain rule violated: {0}")]
    Rule(String),

    /// A referenced aggregate is missing.
    #[error("{0} not found")]
    NotFound(String),

    /// A movement would drive a stock quantity below zero, or a reservation
    /// exceeds what is available.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A movement's quantity does not match its direction (or is zero).
    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn rule(msg: impl Into<String>) -> Self {
        Self::Rule(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_movement(msg: impl Into<String>) -> Self {
        Self::InvalidMovement(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_names_both_quantities() {
        let err = DomainError::insufficient_stock(5, 3);
        assert_eq!(
            err.to_string(),
            "insufficient stock: requested 5, available 3"
        );
    }

    #[test]
    fn rule_violation_carries_message() {
        let err = DomainError::rule("transfer already received");
        assert!(matches!(err, DomainError::Rule(_)));
        assert!(err.to_string().contains("transfer already received"));
    }
}
