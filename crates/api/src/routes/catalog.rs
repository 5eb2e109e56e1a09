//! Catalog intake and direct stock movements.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrganizationId, ProductId};
use domain::Money;
use domain::inventory::{CatalogEntry, ListProduct};
use event_store::EventStore;
use serde::Deserialize;

use super::{parse_id, require_staff};
use crate::caller::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListProductRequest {
    pub name: String,
    pub organization_id: Option<String>,
    /// Minor units.
    pub price: i64,
    pub purchase_price: i64,
    pub stock_qty: u32,
}

#[derive(Deserialize)]
pub struct StockMovementRequest {
    pub quantity: u32,
}

/// POST /products
#[tracing::instrument(skip(state, caller, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(req): Json<ListProductRequest>,
) -> Result<(StatusCode, Json<CatalogEntry>), ApiError> {
    require_staff(&caller, "list products")?;
    let entry = state
        .ledger
        .list_product(caller.user_id, ListProduct {
            name: req.name,
            organization_id: req.organization_id.map(OrganizationId::new),
            price: Money::from_minor(req.price),
            purchase_price: Money::from_minor(req.purchase_price),
            stock_qty: req.stock_qty,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /products/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntry>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    Ok(Json(state.ledger.product(product_id).await?))
}

/// POST /products/{id}/reserve
#[tracing::instrument(skip(state, caller, req))]
pub async fn reserve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(req): Json<StockMovementRequest>,
) -> Result<Json<CatalogEntry>, ApiError> {
    require_staff(&caller, "reserve stock")?;
    let product_id: ProductId = parse_id("product", &id)?;
    Ok(Json(state.ledger.reserve(product_id, req.quantity).await?))
}

/// POST /products/{id}/release
#[tracing::instrument(skip(state, caller, req))]
pub async fn release<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(req): Json<StockMovementRequest>,
) -> Result<Json<CatalogEntry>, ApiError> {
    require_staff(&caller, "release stock")?;
    let product_id: ProductId = parse_id("product", &id)?;
    Ok(Json(state.ledger.release(product_id, req.quantity).await?))
}
