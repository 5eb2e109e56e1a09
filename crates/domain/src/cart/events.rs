use chrono::{DateTime, Utc};
use common::{CartId, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartOpened(CartOpenedData),
    LineAdded(LineAddedData),
    LineQuantityChanged(LineQuantityChangedData),
    LineRemoved(LineRemovedData),
    CartCleared,
    CartConverted(CartConvertedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::LineAdded(_) => "LineAdded",
            CartEvent::LineQuantityChanged(_) => "LineQuantityChanged",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::CartCleared => "CartCleared",
            CartEvent::CartConverted(_) => "CartConverted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: CartId,
    pub owner: UserId,
    pub opened_at: DateTime<Utc>,
}

/// A new line; `unit_price` is the catalog price at the time of adding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAddedData {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartConvertedData {
    pub order_id: OrderId,
    pub order_number: String,
    pub converted_at: DateTime<Utc>,
}
