use chrono::{DateTime, Utc};
use common::{InquiryId, ReplyId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Reply, RequesterContact};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InquiryEvent {
    InquirySubmitted(InquirySubmittedData),
    InquiryRevised(InquiryRevisedData),
    ReplyAdded(Reply),
    ReplyEdited(ReplyEditedData),
    ReplyAccepted(ReplyAcceptedData),
    AcceptanceRejected(AcceptanceRejectedData),
    InquiryEnded(InquiryEndedData),
    ReplyDeleted(ReplyDeletedData),
    InquiryDeleted(InquiryEndedData),
}

impl DomainEvent for InquiryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InquiryEvent::InquirySubmitted(_) => "InquirySubmitted",
            InquiryEvent::InquiryRevised(_) => "InquiryRevised",
            InquiryEvent::ReplyAdded(_) => "ReplyAdded",
            InquiryEvent::ReplyEdited(_) => "ReplyEdited",
            InquiryEvent::ReplyAccepted(_) => "ReplyAccepted",
            InquiryEvent::AcceptanceRejected(_) => "AcceptanceRejected",
            InquiryEvent::InquiryEnded(_) => "InquiryEnded",
            InquiryEvent::ReplyDeleted(_) => "ReplyDeleted",
            InquiryEvent::InquiryDeleted(_) => "InquiryDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquirySubmittedData {
    pub inquiry_id: InquiryId,
    pub requester: UserId,
    pub contact: RequesterContact,
    pub description: String,
    pub media: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryRevisedData {
    pub description: String,
    pub media: Vec<String>,
    pub revised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEditedData {
    pub reply_id: ReplyId,
    pub text: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyAcceptedData {
    pub reply_id: ReplyId,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceRejectedData {
    pub reply_id: ReplyId,
    pub rejected_at: DateTime<Utc>,
}

/// Shared by `InquiryEnded` and `InquiryDeleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryEndedData {
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDeletedData {
    pub reply_id: ReplyId,
    pub deleted_at: DateTime<Utc>,
}
