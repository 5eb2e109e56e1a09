//! Shopping carts.
//!
//! A requester has at most one open cart, tracked by the `active_cart`
//! unique key. The cart is created lazily on the first item and becomes
//! immutable once converted into an order.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Cart, CartLine, CartTotals, recompute};
pub use events::{
    CartConvertedData, CartEvent, CartOpenedData, LineAddedData, LineQuantityChangedData,
    LineRemovedData,
};
pub use service::CartService;

use common::ProductId;
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart already opened")]
    AlreadyOpened,

    #[error("Cart was converted to an order; cannot {action}")]
    Converted { action: &'static str },

    #[error("Cart was already converted to an order")]
    AlreadyConverted,

    #[error("Cart is empty")]
    Empty,

    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(u32),

    #[error("Cart totals would exceed the supported range")]
    TooLarge,

    #[error("Product {0} is not in the cart")]
    LineNotFound(ProductId),
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::AlreadyOpened | CartError::AlreadyConverted => ErrorKind::Conflict,
            CartError::Converted { .. } | CartError::Empty => ErrorKind::InvalidStateTransition,
            CartError::InvalidQuantity(_) | CartError::TooLarge => ErrorKind::InvalidInput,
            CartError::LineNotFound(_) => ErrorKind::NotFound,
        }
    }
}
