//! Orders created from carts.

mod aggregate;
mod events;
mod number;
mod status;

pub use aggregate::{Order, PlaceOrder, ShippingAddress};
pub use events::{OrderEvent, OrderPlacedData, OrderStatusChangedData};
pub use number::OrderNumber;
pub use status::OrderStatus;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Invalid state transition: order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid order number: {0:?}")]
    InvalidNumber(String),

    #[error("Delivery price cannot be negative")]
    NegativeDeliveryPrice,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::AlreadyPlaced => ErrorKind::Conflict,
            OrderError::InvalidStatusTransition { .. } => ErrorKind::InvalidStateTransition,
            OrderError::InvalidNumber(_) | OrderError::NegativeDeliveryPrice => {
                ErrorKind::InvalidInput
            }
        }
    }
}
