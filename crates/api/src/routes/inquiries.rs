//! Inquiry negotiation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CallerProfile, InquiryId, ReplyId};
use domain::inquiry::{InquiryView, Reply, ReviseInquiry, SubmitInquiry};
use event_store::EventStore;
use serde::Deserialize;

use super::parse_id;
use crate::caller::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitInquiryRequest {
    pub description: String,
    #[serde(default)]
    pub media: Vec<String>,
    /// Used for fields the caller's profile lacks.
    #[serde(default)]
    pub contact: CallerProfile,
}

#[derive(Deserialize)]
pub struct ReviseInquiryRequest {
    pub description: Option<String>,
    pub media: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

fn ids(inquiry: &str, reply: &str) -> Result<(InquiryId, ReplyId), ApiError> {
    Ok((parse_id("inquiry", inquiry)?, parse_id("reply", reply)?))
}

/// POST /inquiries
#[tracing::instrument(skip(state, caller, req))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(req): Json<SubmitInquiryRequest>,
) -> Result<(StatusCode, Json<InquiryView>), ApiError> {
    let view = state
        .inquiries
        .submit(
            &caller,
            SubmitInquiry {
                description: req.description,
                media: req.media,
                contact: req.contact,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /inquiries, scoped to what the caller may list.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Vec<InquiryView>>, ApiError> {
    state.refresh_views().await?;
    Ok(Json(state.inquiry_board.list(&caller).await))
}

/// GET /inquiries/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<Json<InquiryView>, ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    Ok(Json(state.inquiries.get(&caller, id).await?))
}

/// PATCH /inquiries/{id}
#[tracing::instrument(skip(state, caller, req))]
pub async fn revise<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(req): Json<ReviseInquiryRequest>,
) -> Result<Json<InquiryView>, ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    let input = ReviseInquiry {
        description: req.description,
        media: req.media,
    };
    Ok(Json(state.inquiries.revise(&caller, id, input).await?))
}

/// DELETE /inquiries/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    state.inquiries.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inquiries/{id}/end
#[tracing::instrument(skip(state, caller))]
pub async fn end<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<Json<InquiryView>, ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    Ok(Json(state.inquiries.end(&caller, id).await?))
}

/// POST /inquiries/{id}/replies
#[tracing::instrument(skip(state, caller, req))]
pub async fn add_reply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    let reply = state.inquiries.add_reply(&caller, id, req.text).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// PATCH /inquiries/{id}/replies/{reply_id}
#[tracing::instrument(skip(state, caller, req))]
pub async fn edit_reply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path((id, reply_id)): Path<(String, String)>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<Reply>, ApiError> {
    let (id, reply_id) = ids(&id, &reply_id)?;
    Ok(Json(
        state
            .inquiries
            .edit_reply(&caller, id, reply_id, req.text)
            .await?,
    ))
}

/// DELETE /inquiries/{id}/replies/{reply_id}
#[tracing::instrument(skip(state, caller))]
pub async fn delete_reply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path((id, reply_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (id, reply_id) = ids(&id, &reply_id)?;
    state.inquiries.delete_reply(&caller, id, reply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inquiries/{id}/replies/{reply_id}/accept
#[tracing::instrument(skip(state, caller))]
pub async fn accept_reply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path((id, reply_id)): Path<(String, String)>,
) -> Result<Json<InquiryView>, ApiError> {
    let (id, reply_id) = ids(&id, &reply_id)?;
    Ok(Json(
        state.inquiries.accept_reply(&caller, id, reply_id).await?,
    ))
}

/// POST /inquiries/{id}/acceptance/reject
#[tracing::instrument(skip(state, caller))]
pub async fn reject_acceptance<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<Json<InquiryView>, ApiError> {
    let id: InquiryId = parse_id("inquiry", &id)?;
    Ok(Json(state.inquiries.reject_acceptance(&caller, id).await?))
}
