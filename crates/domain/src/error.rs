//! Error taxonomy shared by every core operation.

use event_store::EventStoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartError;
use crate::inquiry::InquiryError;
use crate::inventory::InventoryError;
use crate::notification::NotificationError;
use crate::order::OrderError;
use crate::payment::PaymentError;

/// Stable classification of a failure, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InsufficientStock,
    Forbidden,
    InvalidStateTransition,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Inquiry(#[from] InquiryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EventStore(e) => match e {
                EventStoreError::UniqueViolation { .. }
                | EventStoreError::ConcurrencyConflict { .. }
                | EventStoreError::WriteConflict(_) => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
            DomainError::Serialization(_) | DomainError::Internal(_) => ErrorKind::Internal,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Inventory(e) => e.kind(),
            DomainError::Cart(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Payment(e) => e.kind(),
            DomainError::Notification(e) => e.kind(),
            DomainError::Inquiry(e) => e.kind(),
        }
    }

    /// A lost optimistic race; the whole operation may be re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_retryable())
    }
}
