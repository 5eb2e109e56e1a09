//! Orchestrates cart → order → inventory → payment → notification.

use common::{Caller, OrderId, PaymentId, Role};
use domain::cart::Cart;
use domain::inventory::{stage_release, stage_reservation};
use domain::notification::{NotificationTarget, OutboundDispatcher, Severity, enqueue};
use domain::order::{Order, OrderNumber, OrderStatus, PlaceOrder};
use domain::payment::{PaymentKind, PaymentRecord, PaymentStatus, RecordPayment};
use domain::{
    Aggregate, Committed, DEFAULT_MAX_ATTEMPTS, DomainError, Transaction, keys, load_aggregate,
    retry_on_conflict,
};
use event_store::EventStore;

use crate::order_fulfillment::{self, OrderDetails, PlaceOrderRequest};

/// Runs every saga operation as one atomic commit.
///
/// No compensation is needed when a step fails: nothing reaches the store
/// before the commit. The only compensating action is the inventory
/// release performed when an order is cancelled.
pub struct OrderFulfillmentSaga<S: EventStore> {
    store: S,
    outbound: OutboundDispatcher,
    max_attempts: u32,
}

impl<S: EventStore> OrderFulfillmentSaga<S> {
    pub fn new(store: S, outbound: OutboundDispatcher) -> Self {
        Self {
            store,
            outbound,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Converts the caller's open cart into an order.
    ///
    /// Fails with `NotFound` without an open cart, `InsufficientStock`
    /// naming the first short product, and `Conflict` when the cart or the
    /// supplied order number is already taken.
    #[tracing::instrument(skip(self, caller, request), fields(saga_type = order_fulfillment::SAGA_TYPE, user_id = %caller.user_id))]
    pub async fn create_order_from_cart(
        &self,
        caller: &Caller,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetails, DomainError> {
        let started = std::time::Instant::now();
        let store = &self.store;
        let request = &request;

        let (details, committed) =
            retry_on_conflict("create_order", self.max_attempts, move || async move {
                let mut tx = Transaction::begin(store).on_behalf_of(caller.user_id);

                let cart_id = tx
                    .resolve(&keys::active_cart(caller.user_id))
                    .await?
                    .ok_or_else(|| DomainError::not_found("Cart", caller.user_id))?;
                let mut cart: Cart = tx.load_existing(cart_id, "Cart").await?;
                let cart_id = cart
                    .cart_id()
                    .ok_or_else(|| DomainError::not_found("Cart", cart_id))?;

                let number = request
                    .payment
                    .order_number
                    .clone()
                    .unwrap_or_else(OrderNumber::generate);
                let order_id = OrderId::new();

                tracing::debug!(step = order_fulfillment::STEP_CONVERT_CART, %cart_id, "saga step");
                let events = cart.convert(order_id, &number)?;
                tx.stage(&mut cart, events)?;
                tx.claim(keys::cart_order(cart_id), order_id);
                tx.release(keys::active_cart(caller.user_id));

                tracing::debug!(step = order_fulfillment::STEP_PLACE_ORDER, order_number = %number, "saga step");
                let subtotal = cart.totals().price;
                let mut order = Order::default();
                let events = order.place(PlaceOrder {
                    order_id,
                    order_number: number.clone(),
                    cart_id,
                    requester: caller.user_id,
                    address: request.address.clone(),
                    subtotal,
                    delivery_price: request.delivery_price,
                    delivery_date: request.delivery_date,
                })?;
                tx.stage(&mut order, events)?;
                tx.claim(keys::order_number(&number), order_id);

                tracing::debug!(
                    step = order_fulfillment::STEP_RESERVE_INVENTORY,
                    lines = cart.lines().len(),
                    "saga step"
                );
                for line in cart.lines() {
                    stage_reservation(
                        &mut tx,
                        line.product_id,
                        line.quantity,
                        Some(number.to_string()),
                    )
                    .await?;
                }

                tracing::debug!(step = order_fulfillment::STEP_RECORD_PAYMENT, "saga step");
                let payment_id = PaymentId::new();
                let mut payment = PaymentRecord::default();
                let events = payment.record(RecordPayment {
                    payment_id,
                    order_number: number.clone(),
                    payer: caller.user_id,
                    status: request.payment.status.unwrap_or_default(),
                    channel: request.payment.channel,
                    wallet: request.payment.wallet,
                    kind: PaymentKind::Revenues,
                    reference: request.payment.reference.clone(),
                    proof: request.payment.proof.clone(),
                    total_price: subtotal + request.delivery_price,
                })?;
                tx.stage(&mut payment, events)?;
                tx.claim(keys::order_payment(&number), payment_id);

                tracing::debug!(step = order_fulfillment::STEP_NOTIFY, "saga step");
                enqueue(
                    &mut tx,
                    NotificationTarget::Role(Role::Operation),
                    "New order to review",
                    format!("Order {number} is waiting for review"),
                    Severity::Info,
                )?;
                enqueue(
                    &mut tx,
                    NotificationTarget::User(caller.user_id),
                    "Order created",
                    format!("Your order {number} was created"),
                    Severity::Success,
                )?;

                let committed = tx.commit().await?;
                let details = OrderDetails {
                    order,
                    payment,
                    lines: cart.lines().to_vec(),
                };
                Ok((details, committed))
            })
            .await?;

        self.deliver(&committed).await;
        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("saga_duration_seconds", "operation" => "create_order")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_number = ?details.order.number().map(OrderNumber::as_str),
            total = %details.payment.total_price(),
            "order created"
        );
        Ok(details)
    }

    /// Moves an order to `to`, keeping its payment record in step.
    ///
    /// Cancelling releases the stock of every cart line. Terminal statuses
    /// accept no further change, so a second cancellation is refused with
    /// `InvalidStateTransition` and stock is never credited twice.
    #[tracing::instrument(skip(self, caller), fields(saga_type = order_fulfillment::SAGA_TYPE, user_id = %caller.user_id))]
    pub async fn update_order_status(
        &self,
        caller: &Caller,
        number: &OrderNumber,
        to: OrderStatus,
    ) -> Result<OrderDetails, DomainError> {
        if !matches!(caller.role, Role::Operation | Role::Admin) {
            return Err(DomainError::Forbidden(
                "only operations or admins may change order status".to_string(),
            ));
        }
        let started = std::time::Instant::now();
        let store = &self.store;
        let operator = caller.operator();
        let operator = &operator;

        let (details, committed) =
            retry_on_conflict("update_order_status", self.max_attempts, move || async move {
                let mut tx = Transaction::begin(store).on_behalf_of(caller.user_id);

                let payment_id = tx
                    .resolve(&keys::order_payment(number))
                    .await?
                    .ok_or_else(|| DomainError::not_found("Payment", number))?;
                let mut payment: PaymentRecord = tx.load_existing(payment_id, "Payment").await?;

                let events = payment.touch(operator)?;
                tx.stage(&mut payment, events)?;
                if let Some(status) = PaymentStatus::implied_by(to) {
                    let events = payment.set_status(status)?;
                    tx.stage(&mut payment, events)?;
                }

                let order_id = tx
                    .resolve(&keys::order_number(number))
                    .await?
                    .ok_or_else(|| DomainError::not_found("Order", number))?;
                let mut order: Order = tx.load_existing(order_id, "Order").await?;
                let events = order.change_status(to, operator.clone())?;
                tx.stage(&mut order, events)?;

                let cart_id = order
                    .cart_id()
                    .ok_or_else(|| DomainError::Internal(format!("order {number} has no cart")))?;
                let cart: Cart = tx.load_existing(cart_id.into(), "Cart").await?;

                if to == OrderStatus::Cancelled {
                    tracing::debug!(
                        step = order_fulfillment::STEP_RELEASE_INVENTORY,
                        lines = cart.lines().len(),
                        "compensating"
                    );
                    for line in cart.lines() {
                        stage_release(
                            &mut tx,
                            line.product_id,
                            line.quantity,
                            Some(number.to_string()),
                        )
                        .await?;
                    }
                }

                let requester = order
                    .requester()
                    .ok_or_else(|| DomainError::Internal(format!("order {number} has no requester")))?;
                let severity = match to {
                    OrderStatus::Cancelled => Severity::Warning,
                    OrderStatus::Delivered => Severity::Success,
                    _ => Severity::Info,
                };
                enqueue(
                    &mut tx,
                    NotificationTarget::User(requester),
                    "Order status updated",
                    format!("Your order {number} is now {to}"),
                    severity,
                )?;

                let committed = tx.commit().await?;
                let details = OrderDetails {
                    order,
                    payment,
                    lines: cart.lines().to_vec(),
                };
                Ok((details, committed))
            })
            .await?;

        self.deliver(&committed).await;
        metrics::counter!("orders_status_changed_total", "status" => to.as_str()).increment(1);
        metrics::histogram!("saga_duration_seconds", "operation" => "update_order_status")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_number = %number, status = %to, operator = %operator, "order status changed");
        Ok(details)
    }

    /// Order with payment and lines. Requesters may read only their own.
    pub async fn get_order(
        &self,
        caller: &Caller,
        number: &OrderNumber,
    ) -> Result<OrderDetails, DomainError> {
        let order_id = self
            .store
            .resolve_key(&keys::order_number(number))
            .await?
            .ok_or_else(|| DomainError::not_found("Order", number))?;
        let order: Order = load_aggregate(&self.store, order_id).await?;
        if !order.exists() {
            return Err(DomainError::not_found("Order", number));
        }
        if caller.role == Role::User && order.requester() != Some(caller.user_id) {
            return Err(DomainError::Forbidden(format!(
                "order {number} belongs to another requester"
            )));
        }

        let payment_id = self
            .store
            .resolve_key(&keys::order_payment(number))
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", number))?;
        let payment: PaymentRecord = load_aggregate(&self.store, payment_id).await?;

        let lines = match order.cart_id() {
            Some(cart_id) => {
                let cart: Cart = load_aggregate(&self.store, cart_id.into()).await?;
                cart.lines().to_vec()
            }
            None => Vec::new(),
        };
        Ok(OrderDetails {
            order,
            payment,
            lines,
        })
    }

    async fn deliver(&self, committed: &Committed) {
        let report = self.outbound.flush(&committed.outbox).await;
        if report.failed > 0 {
            tracing::warn!(
                transaction_id = %committed.transaction_id,
                failed = report.failed,
                "some order notifications were not delivered"
            );
        }
    }
}
