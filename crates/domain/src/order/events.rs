use chrono::{DateTime, Utc};
use common::{CartId, OperatorId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{OrderNumber, OrderStatus, ShippingAddress};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),
    OrderStatusChanged(OrderStatusChangedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub cart_id: CartId,
    pub requester: UserId,
    pub address: ShippingAddress,
    /// Cart price at conversion time.
    pub subtotal: Money,
    pub delivery_price: Money,
    pub delivery_date: Option<DateTime<Utc>>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub operator: OperatorId,
    pub changed_at: DateTime<Utc>,
}
