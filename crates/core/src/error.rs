//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage and transport failures belong to the infra
/// layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. empty sku).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// No product exists for the requested sku.
    #[error("Invalid sku {0}")]
    InvalidSku(String),

    /// No batch could satisfy an order line.
    #[error("Out of stock for sku {0}")]
    OutOfStock(String),

    /// A requested resource was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. duplicate batch reference).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_sku(sku: impl Into<String>) -> Self {
        Self::InvalidSku(sku.into())
    }

    pub fn out_of_stock(sku: impl Into<String>) -> Self {
        Self::OutOfStock(sku.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_sku() {
        assert_eq!(
            DomainError::invalid_sku("NONEXISTENTSKU").to_string(),
            "Invalid sku NONEXISTENTSKU"
        );
        assert_eq!(
            DomainError::out_of_stock("SMALL-FORK").to_string(),
            "Out of stock for sku SMALL-FORK"
        );
    }
}
