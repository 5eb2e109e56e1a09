//! Order board: one row per order with its payment status folded in.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, OrderId, UserId};
use domain::Money;
use domain::order::{OrderEvent, OrderNumber, OrderStatus};
use domain::payment::{PaymentEvent, PaymentKind, PaymentStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

const NAME: &str = "OrderBoardView";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub requester: UserId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub delivery_price: Money,
    pub total: Money,
    pub payment_status: Option<PaymentStatus>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct OrderBoardState {
    orders: HashMap<OrderNumber, OrderSummary>,
    numbers: HashMap<AggregateId, OrderNumber>,
    /// Payment stream -> the order number it pays for.
    payments: HashMap<AggregateId, OrderNumber>,
    /// Payment status seen before its order was placed.
    early_payments: HashMap<OrderNumber, PaymentStatus>,
    /// Stock purchase records; they belong to no order.
    expenses: HashSet<AggregateId>,
    position: ProjectionPosition,
}

impl OrderBoardState {
    fn empty() -> Self {
        Self {
            orders: HashMap::new(),
            numbers: HashMap::new(),
            payments: HashMap::new(),
            early_payments: HashMap::new(),
            expenses: HashSet::new(),
            position: ProjectionPosition::zero(),
        }
    }

    fn apply_order(&mut self, event: &EventEnvelope, order_event: OrderEvent) -> Result<()> {
        match order_event {
            OrderEvent::OrderPlaced(data) => {
                let payment_status = self.early_payments.remove(&data.order_number);
                self.numbers
                    .insert(event.aggregate_id, data.order_number.clone());
                self.orders.insert(
                    data.order_number.clone(),
                    OrderSummary {
                        order_id: data.order_id,
                        order_number: data.order_number,
                        requester: data.requester,
                        status: OrderStatus::UnderReview,
                        subtotal: data.subtotal,
                        delivery_price: data.delivery_price,
                        total: data.subtotal + data.delivery_price,
                        payment_status,
                        placed_at: data.placed_at,
                        updated_at: data.placed_at,
                    },
                );
            }
            OrderEvent::OrderStatusChanged(data) => {
                let summary = self
                    .numbers
                    .get(&event.aggregate_id)
                    .and_then(|number| self.orders.get_mut(number))
                    .ok_or_else(|| unknown_stream(event))?;
                summary.status = data.to;
                summary.updated_at = data.changed_at;
            }
        }
        Ok(())
    }

    fn apply_payment(&mut self, event: &EventEnvelope, payment_event: PaymentEvent) -> Result<()> {
        if self.expenses.contains(&event.aggregate_id) {
            return Ok(());
        }
        let (number, status) = match payment_event {
            PaymentEvent::PaymentRecorded(data) if data.kind == PaymentKind::Expenses => {
                self.expenses.insert(event.aggregate_id);
                return Ok(());
            }
            PaymentEvent::PaymentRecorded(data) => {
                self.payments
                    .insert(event.aggregate_id, data.order_number.clone());
                (data.order_number, data.status)
            }
            PaymentEvent::PaymentStatusChanged(data) => {
                let number = self
                    .payments
                    .get(&event.aggregate_id)
                    .cloned()
                    .ok_or_else(|| unknown_stream(event))?;
                (number, data.to)
            }
            PaymentEvent::OperatorRecorded(_) => return Ok(()),
        };

        match self.orders.get_mut(&number) {
            Some(summary) => summary.payment_status = Some(status),
            None => {
                self.early_payments.insert(number, status);
            }
        }
        Ok(())
    }
}

fn unknown_stream(event: &EventEnvelope) -> ProjectionError {
    ProjectionError::UnknownStream {
        projection: NAME,
        event_type: event.event_type.clone(),
        aggregate_id: event.aggregate_id,
    }
}

/// Orders as operators and requesters list them.
#[derive(Clone)]
pub struct OrderBoardView {
    state: Arc<RwLock<OrderBoardState>>,
}

impl OrderBoardView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(OrderBoardState::empty())),
        }
    }

    pub async fn get(&self, number: &OrderNumber) -> Option<OrderSummary> {
        self.state.read().await.orders.get(number).cloned()
    }

    /// Every order, newest first.
    pub async fn all(&self) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        newest_first(state.orders.values().cloned().collect())
    }

    pub async fn for_requester(&self, requester: UserId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        newest_first(
            state
                .orders
                .values()
                .filter(|o| o.requester == requester)
                .cloned()
                .collect(),
        )
    }

    pub async fn by_status(&self, status: OrderStatus) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        newest_first(
            state
                .orders
                .values()
                .filter(|o| o.status == status)
                .cloned()
                .collect(),
        )
    }
}

fn newest_first(mut orders: Vec<OrderSummary>) -> Vec<OrderSummary> {
    orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
    orders
}

impl Default for OrderBoardView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for OrderBoardView {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        let applied = match event.aggregate_type.as_str() {
            "Order" => {
                let order_event = serde_json::from_value(event.payload.clone())?;
                state.apply_order(event, order_event)
            }
            "Payment" => {
                let payment_event = serde_json::from_value(event.payload.clone())?;
                state.apply_payment(event, payment_event)
            }
            _ => Ok(()),
        };
        state.position = state.position.advance();
        applied
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OrderBoardState::empty();
        Ok(())
    }
}

impl ReadModel for OrderBoardView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
