//! HTTP surface of the commerce core.
//!
//! Every route takes the caller identity from gateway headers (see
//! [`caller`]), calls one core operation and maps failures through
//! [`error::ApiError`]. Listings are served from read models caught up on
//! each request.

pub mod caller;
pub mod config;
pub mod delivery;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/products", post(routes::catalog::create::<S>))
        .route("/products/{id}", get(routes::catalog::get::<S>))
        .route("/products/{id}/reserve", post(routes::catalog::reserve::<S>))
        .route("/products/{id}/release", post(routes::catalog::release::<S>))
        .route(
            "/cart",
            get(routes::carts::get::<S>).delete(routes::carts::clear::<S>),
        )
        .route("/cart/items", post(routes::carts::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::carts::change_quantity::<S>).delete(routes::carts::remove_item::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{number}", get(routes::orders::get::<S>))
        .route(
            "/orders/{number}/status",
            put(routes::orders::update_status::<S>),
        )
        .route(
            "/inquiries",
            post(routes::inquiries::submit::<S>).get(routes::inquiries::list::<S>),
        )
        .route(
            "/inquiries/{id}",
            get(routes::inquiries::get::<S>)
                .patch(routes::inquiries::revise::<S>)
                .delete(routes::inquiries::delete::<S>),
        )
        .route("/inquiries/{id}/end", post(routes::inquiries::end::<S>))
        .route(
            "/inquiries/{id}/replies",
            post(routes::inquiries::add_reply::<S>),
        )
        .route(
            "/inquiries/{id}/replies/{reply_id}",
            axum::routing::patch(routes::inquiries::edit_reply::<S>)
                .delete(routes::inquiries::delete_reply::<S>),
        )
        .route(
            "/inquiries/{id}/replies/{reply_id}/accept",
            post(routes::inquiries::accept_reply::<S>),
        )
        .route(
            "/inquiries/{id}/acceptance/reject",
            post(routes::inquiries::reject_acceptance::<S>),
        )
        .route(
            "/notifications",
            get(routes::notifications::inbox::<S>)
                .delete(routes::notifications::delete_all::<S>),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read::<S>),
        )
        .route(
            "/notifications/{id}",
            delete(routes::notifications::delete::<S>),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read::<S>),
        )
        .route_layer(middleware::from_fn(routes::metrics::track))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
