//! The caller's open cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartId, ProductId};
use domain::Money;
use domain::cart::{Cart, CartLine};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::caller::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ChangeQuantityRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: Option<CartId>,
    pub lines: Vec<CartLine>,
    pub total_quantity: u32,
    pub total_price: Money,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        let totals = cart.totals();
        Self {
            cart_id: cart.cart_id(),
            lines: cart.lines().to_vec(),
            total_quantity: totals.quantity,
            total_price: totals.price,
        }
    }
}

/// GET /cart. `null` when the caller has no open cart.
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Option<CartResponse>>, ApiError> {
    let cart = state.carts.active_cart(&caller).await?;
    Ok(Json(cart.as_ref().map(CartResponse::from)))
}

/// POST /cart/items
#[tracing::instrument(skip(state, caller, req))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &req.product_id)?;
    let cart = state
        .carts
        .add_item(&caller, product_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// PUT /cart/items/{product_id}
#[tracing::instrument(skip(state, caller, req))]
pub async fn change_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(product_id): Path<String>,
    Json(req): Json<ChangeQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state
        .carts
        .change_quantity(&caller, product_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state, caller))]
pub async fn remove_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state.carts.remove_item(&caller, product_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart
#[tracing::instrument(skip(state, caller))]
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear(&caller).await?;
    Ok(Json(CartResponse::from(&cart)))
}
