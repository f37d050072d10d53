pub mod repository;
pub mod requests;
pub mod service;
pub mod memory;

use stockline_catalog::{AllocationError, InventoryError};
use stockline_order::OrderError;

pub use memory::MemoryStore;
pub use repository::{BatchLedger, FulfillmentStore, PaymentOutcome, ReturnOutcome, TransitionOutcome};
pub use service::{FulfillmentRules, FulfillmentService};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Insufficient stock for product {product_id}{}: requested {requested}, available {available}", in_batch(.batch_id))]
    InsufficientStock {
        product_id: String,
        batch_id: Option<String>,
        requested: i64,
        available: i64,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound { entity, id: id.into() }
    }

    /// Stable machine-readable name, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "validation_error",
            CoreError::InsufficientStock { .. } => "insufficient_stock",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::InvalidState(_) => "invalid_state",
            CoreError::NotFound { .. } => "not_found",
            CoreError::StorageError(_) => "storage_error",
        }
    }
}

impl From<OrderError> for CoreError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => CoreError::ValidationError(msg),
            OrderError::InvalidTransition { from, to } => CoreError::InvalidTransition { from, to },
            OrderError::InvalidState { order_id, reason } => {
                CoreError::InvalidState(format!("order {}: {}", order_id, reason))
            }
        }
    }
}

impl From<AllocationError> for CoreError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InsufficientStock { product_id, requested, available } => {
                CoreError::InsufficientStock {
                    product_id,
                    batch_id: None,
                    requested: requested as i64,
                    available,
                }
            }
            other => CoreError::ValidationError(other.to_string()),
        }
    }
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientBatchQuantity { product_id, batch_id, requested, available } => {
                CoreError::InsufficientStock {
                    product_id,
                    batch_id: Some(batch_id),
                    requested: requested as i64,
                    available: available as i64,
                }
            }
            other => CoreError::ValidationError(other.to_string()),
        }
    }
}

fn in_batch(batch_id: &Option<String>) -> String {
    batch_id.as_ref().map(|b| format!(" in batch {}", b)).unwrap_or_default()
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_batch() {
        let err: CoreError = InventoryError::InsufficientBatchQuantity {
            product_id: "PRD001".to_string(),
            batch_id: "B1".to_string(),
            requested: 8,
            available: 5,
        }
        .into();

        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product PRD001 in batch B1: requested 8, available 5"
        );
    }

    #[test]
    fn test_allocation_shortfall_has_no_batch() {
        let err: CoreError = AllocationError::InsufficientStock {
            product_id: "PRD001".to_string(),
            requested: 20,
            available: 15,
        }
        .into();

        assert!(matches!(err, CoreError::InsufficientStock { batch_id: None, requested: 20, available: 15, .. }));
    }

    #[test]
    fn test_order_errors_keep_their_kind() {
        let err: CoreError = OrderError::InvalidTransition {
            from: "delivered".to_string(),
            to: "cancelled".to_string(),
        }
        .into();
        assert_eq!(err.code(), "invalid_transition");

        let err: CoreError = OrderError::Validation("bad".to_string()).into();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }
}
