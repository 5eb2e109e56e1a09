//! Inventory ledger: per-product available quantity.
//!
//! Each product is its own event stream, so two reservations against the
//! same product contend on that stream's version. The loser's commit fails
//! and is retried against the fresh stock level; no application lock is
//! involved.

mod events;
mod ledger;
mod product;

pub use events::{ProductEvent, ProductListedData, StockMovementData};
pub use ledger::{InventoryLedger, stage_release, stage_reservation};
pub use product::{CatalogEntry, ListProduct, Product};

use common::ProductId;
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Product is not listed")]
    NotListed,

    #[error("Product already listed: {0}")]
    AlreadyListed(ProductId),

    #[error(
        "Insufficient stock for {product_name} ({product_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(u32),

    #[error("Invalid price: {0}")]
    InvalidPrice(crate::Money),
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::NotListed => ErrorKind::NotFound,
            InventoryError::AlreadyListed(_) => ErrorKind::Conflict,
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::InvalidQuantity(_) | InventoryError::InvalidPrice(_) => {
                ErrorKind::InvalidInput
            }
        }
    }
}
