use chrono::{DateTime, Utc};
use common::{OrganizationId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    ProductListed(ProductListedData),
    StockReserved(StockMovementData),
    StockReleased(StockMovementData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductListed(_) => "ProductListed",
            ProductEvent::StockReserved(_) => "StockReserved",
            ProductEvent::StockReleased(_) => "StockReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListedData {
    pub product_id: ProductId,
    pub name: String,
    pub organization_id: Option<OrganizationId>,
    pub price: Money,
    pub purchase_price: Money,
    pub stock_qty: u32,
    pub listed_at: DateTime<Utc>,
}

/// A reservation or a release of stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementData {
    pub quantity: u32,
    /// Order number the movement belongs to, if any.
    pub reference: Option<String>,
    /// Stock left after the movement.
    pub remaining: u32,
    pub at: DateTime<Utc>,
}
