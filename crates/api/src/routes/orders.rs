//! Order creation from the cart, status changes and reads.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OperatorId, OrderId, PaymentId, Role, UserId};
use domain::cart::CartLine;
use domain::order::{OrderNumber, OrderStatus, ShippingAddress};
use domain::payment::{PaymentChannel, PaymentKind, PaymentStatus, PaymentWallet};
use domain::{DomainError, Money};
use event_store::EventStore;
use projections::OrderSummary;
use saga::{OrderDetails, PaymentIntent, PlaceOrderRequest};
use serde::{Deserialize, Serialize};

use crate::caller::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub address: ShippingAddress,
    /// Minor units.
    #[serde(default)]
    pub delivery_price: i64,
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment: PaymentRequest,
}

#[derive(Deserialize, Default)]
pub struct PaymentRequest {
    #[serde(default)]
    pub channel: PaymentChannel,
    pub wallet: Option<PaymentWallet>,
    pub status: Option<PaymentStatus>,
    pub reference: Option<String>,
    /// Externally supplied order number.
    pub order_number: Option<String>,
    pub proof: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub payment_id: Option<PaymentId>,
    pub status: PaymentStatus,
    pub channel: PaymentChannel,
    pub wallet: Option<PaymentWallet>,
    pub kind: PaymentKind,
    pub reference: Option<String>,
    pub proof: Option<String>,
    pub total_price: Money,
    pub operators: Vec<OperatorId>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: Option<OrderId>,
    pub order_number: Option<OrderNumber>,
    pub requester: Option<UserId>,
    pub status: OrderStatus,
    pub address: Option<ShippingAddress>,
    pub subtotal: Money,
    pub delivery_price: Money,
    pub total: Money,
    pub delivery_date: Option<DateTime<Utc>>,
    pub placed_at: Option<DateTime<Utc>>,
    pub payment: PaymentResponse,
    pub lines: Vec<CartLine>,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let OrderDetails {
            order,
            payment,
            lines,
        } = details;
        Self {
            order_id: order.order_id(),
            order_number: order.number().cloned(),
            requester: order.requester(),
            status: order.status(),
            address: order.address().cloned(),
            subtotal: order.subtotal(),
            delivery_price: order.delivery_price(),
            total: order.total(),
            delivery_date: order.delivery_date(),
            placed_at: order.placed_at(),
            payment: PaymentResponse {
                payment_id: payment.payment_id(),
                status: payment.status(),
                channel: payment.channel(),
                wallet: payment.wallet(),
                kind: payment.kind(),
                reference: payment.reference().map(str::to_string),
                proof: payment.proof().map(str::to_string),
                total_price: payment.total_price(),
                operators: payment.operators().to_vec(),
            },
            lines,
        }
    }
}

/// POST /orders: converts the caller's open cart into an order.
#[tracing::instrument(skip(state, caller, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order_number = req
        .payment
        .order_number
        .as_deref()
        .map(OrderNumber::parse)
        .transpose()
        .map_err(DomainError::from)?;

    let details = state
        .orders
        .create_order_from_cart(
            &caller,
            PlaceOrderRequest {
                address: req.address,
                delivery_price: Money::from_minor(req.delivery_price),
                delivery_date: req.delivery_date,
                payment: PaymentIntent {
                    channel: req.payment.channel,
                    wallet: req.payment.wallet,
                    status: req.payment.status,
                    reference: req.payment.reference,
                    order_number,
                    proof: req.payment.proof,
                },
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(details))))
}

/// GET /orders. Requesters see their own, staff see every order.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    state.refresh_views().await?;

    let mut orders = match caller.role {
        Role::User => state.order_board.for_requester(caller.user_id).await,
        Role::Operation | Role::Admin => state.order_board.all().await,
    };
    if let Some(status) = query.status {
        orders.retain(|o| o.status == status);
    }
    Ok(Json(orders))
}

/// GET /orders/{number}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let number = OrderNumber::parse(&number).map_err(DomainError::from)?;
    let details = state.orders.get_order(&caller, &number).await?;
    Ok(Json(OrderResponse::from(details)))
}

/// PUT /orders/{number}/status
#[tracing::instrument(skip(state, caller, req))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(number): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let number = OrderNumber::parse(&number).map_err(DomainError::from)?;
    let details = state
        .orders
        .update_order_status(&caller, &number, req.status)
        .await?;
    Ok(Json(OrderResponse::from(details)))
}
