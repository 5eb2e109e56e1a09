//! The caller's notification inbox.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::NotificationId;
use domain::notification::NotificationRecord;
use event_store::EventStore;
use projections::InboxEntry;
use serde::Serialize;

use super::parse_id;
use crate::caller::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct InboxResponse {
    pub unread: usize,
    pub notifications: Vec<InboxEntry>,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

#[derive(Serialize)]
pub struct DeleteAllResponse {
    pub deleted: usize,
}

/// GET /notifications
pub async fn inbox<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<InboxResponse>, ApiError> {
    state.refresh_views().await?;
    Ok(Json(InboxResponse {
        unread: state.inbox.unread_count(&caller).await,
        notifications: state.inbox.inbox(&caller).await,
    }))
}

/// POST /notifications/{id}/read
#[tracing::instrument(skip(state, caller))]
pub async fn mark_read<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<Json<NotificationRecord>, ApiError> {
    let id: NotificationId = parse_id("notification", &id)?;
    Ok(Json(state.notifications.mark_read(&caller, id).await?))
}

/// POST /notifications/read-all: marks every unread inbox entry.
#[tracing::instrument(skip(state, caller))]
pub async fn mark_all_read<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    state.refresh_views().await?;
    let unread: Vec<NotificationId> = state
        .inbox
        .inbox(&caller)
        .await
        .into_iter()
        .filter(|e| !e.read)
        .map(|e| e.id)
        .collect();
    let marked = state.notifications.mark_all_read(&caller, &unread).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}

/// DELETE /notifications/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: NotificationId = parse_id("notification", &id)?;
    state.notifications.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /notifications: deletes every entry in the caller's inbox.
#[tracing::instrument(skip(state, caller))]
pub async fn delete_all<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    state.refresh_views().await?;
    let ids: Vec<NotificationId> = state
        .inbox
        .inbox(&caller)
        .await
        .into_iter()
        .map(|e| e.id)
        .collect();
    let deleted = state.notifications.delete_all(&caller, &ids).await?;
    Ok(Json(DeleteAllResponse { deleted }))
}
