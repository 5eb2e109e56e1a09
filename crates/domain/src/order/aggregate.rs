use chrono::{DateTime, Utc};
use common::{AggregateId, CartId, OperatorId, OrderId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    OrderError, OrderEvent, OrderNumber, OrderPlacedData, OrderStatus, OrderStatusChangedData,
};

/// Address copied into the order when it is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub region: Option<String>,
}

/// Everything an order is created with.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub cart_id: CartId,
    pub requester: UserId,
    pub address: ShippingAddress,
    pub subtotal: Money,
    pub delivery_price: Money,
    pub delivery_date: Option<DateTime<Utc>>,
}

/// An order. Only its status changes after placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,
    #[serde(default)]
    version: Version,
    number: Option<OrderNumber>,
    cart_id: Option<CartId>,
    requester: Option<UserId>,
    status: OrderStatus,
    address: Option<ShippingAddress>,
    subtotal: Money,
    delivery_price: Money,
    delivery_date: Option<DateTime<Utc>>,
    placed_at: Option<DateTime<Utc>>,
    last_operator: Option<OperatorId>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => {
                self.id = Some(data.order_id);
                self.number = Some(data.order_number);
                self.cart_id = Some(data.cart_id);
                self.requester = Some(data.requester);
                self.status = OrderStatus::UnderReview;
                self.address = Some(data.address);
                self.subtotal = data.subtotal;
                self.delivery_price = data.delivery_price;
                self.delivery_date = data.delivery_date;
                self.placed_at = Some(data.placed_at);
            }
            OrderEvent::OrderStatusChanged(data) => {
                self.status = data.to;
                self.last_operator = Some(data.operator);
            }
        }
    }
}

impl Order {
    pub fn order_id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn number(&self) -> Option<&OrderNumber> {
        self.number.as_ref()
    }

    pub fn cart_id(&self) -> Option<CartId> {
        self.cart_id
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn address(&self) -> Option<&ShippingAddress> {
        self.address.as_ref()
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn delivery_price(&self) -> Money {
        self.delivery_price
    }

    pub fn delivery_date(&self) -> Option<DateTime<Utc>> {
        self.delivery_date
    }

    pub fn total(&self) -> Money {
        self.subtotal + self.delivery_price
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn last_operator(&self) -> Option<&OperatorId> {
        self.last_operator.as_ref()
    }

    pub fn place(&self, input: PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if input.delivery_price.is_negative() {
            return Err(OrderError::NegativeDeliveryPrice);
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: input.order_id,
            order_number: input.order_number,
            cart_id: input.cart_id,
            requester: input.requester,
            address: input.address,
            subtotal: input.subtotal,
            delivery_price: input.delivery_price,
            delivery_date: input.delivery_date,
            placed_at: Utc::now(),
        })])
    }

    /// Moves the order to `to` if the transition table allows it.
    pub fn change_status(
        &self,
        to: OrderStatus,
        operator: OperatorId,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            from: self.status,
            to,
            operator,
            changed_at: Utc::now(),
        })])
    }
}
