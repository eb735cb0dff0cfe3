use thiserror::Error;

use procure_core::DomainError;

use crate::store::StoreError;

/// Failure of a purchase order engine operation.
///
/// Every domain and store failure collapses into one of four kinds, which the
/// HTTP layer maps onto status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Missing supplier, product, order or invoice.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request or a reference to an inactive catalog record.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The order is not in a state that allows the operation, or another
    /// writer changed it first.
    #[error("conflicting state: {0}")]
    ConflictingState(String),

    /// Backend failure or a broken internal invariant.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::ConflictingState(_) => "conflicting_state",
            EngineError::Storage(_) => "storage_error",
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::InvalidInput(msg),
            DomainError::InvalidId(msg) => EngineError::InvalidInput(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::Conflict(msg) => EngineError::ConflictingState(msg),
            DomainError::InvariantViolation(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => EngineError::ConflictingState(msg),
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Backend(msg) => EngineError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_engine_kinds() {
        assert!(matches!(
            EngineError::from(DomainError::validation("x")),
            EngineError::InvalidInput(_)
        ));
        assert!(matches!(
            EngineError::from(DomainError::invalid_id("x")),
            EngineError::InvalidInput(_)
        ));
        assert!(matches!(
            EngineError::from(DomainError::conflict("x")),
            EngineError::ConflictingState(_)
        ));
        assert!(matches!(
            EngineError::from(DomainError::invariant("x")),
            EngineError::Storage(_)
        ));
    }

    #[test]
    fn stale_writes_are_conflicts() {
        let err = EngineError::from(StoreError::Concurrency("expected 2, found 3".into()));
        assert_eq!(err.code(), "conflicting_state");
    }
}
