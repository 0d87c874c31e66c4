//! Error kinds raised while running a cycle.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::OrderId;

use super::ledger::LedgerError;

/// Cycle-level failure: the cycle aborts before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
}

/// Per-instrument failure: recorded in the cycle report, the cycle continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error(transparent)]
    DuplicateAction(#[from] LedgerError),

    #[error("Insufficient cash: need {required}, available {available}")]
    InsufficientCash { required: Decimal, available: Decimal },

    #[error("Order {0} still pending")]
    PendingOrder(OrderId),

    #[error("Failed to cancel order {order_id}: {reason}")]
    CancelFailed { order_id: OrderId, reason: String },
}
