//! Payment records, one per order.

mod aggregate;
mod events;
mod types;

pub use aggregate::{PaymentRecord, RecordPayment};
pub use events::{
    OperatorRecordedData, PaymentEvent, PaymentRecordedData, PaymentStatusChangedData,
};
pub use types::{PaymentChannel, PaymentKind, PaymentStatus, PaymentWallet};

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment already recorded for this order")]
    AlreadyRecorded,

    #[error("Payment has not been recorded")]
    NotRecorded,

    #[error("Payment total cannot be negative")]
    NegativeTotal,

    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::AlreadyRecorded => ErrorKind::Conflict,
            PaymentError::NotRecorded => ErrorKind::NotFound,
            PaymentError::NegativeTotal => ErrorKind::InvalidInput,
            PaymentError::InvalidTransition { .. } => ErrorKind::InvalidStateTransition,
        }
    }
}
