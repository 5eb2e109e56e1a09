//! Liveness plus a glance at the read models.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::ReadModel;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Entries per read model. Not caught up first, so may lag the store.
    pub read_models: BTreeMap<&'static str, usize>,
}

/// GET /health
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let models: [&dyn ReadModel; 3] = [&state.order_board, &state.inbox, &state.inquiry_board];
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        read_models: models.iter().map(|m| (m.name(), m.count())).collect(),
    })
}
