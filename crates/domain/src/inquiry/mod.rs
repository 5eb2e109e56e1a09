//! Inquiries: one requester, competing organization replies, a single
//! accepted winner.

mod aggregate;
mod events;
mod status;
mod view;

pub use aggregate::{Inquiry, MAX_ATTACHMENTS, Reply, RequesterContact, ReviseInquiry, SubmitInquiry};
pub use events::{
    AcceptanceRejectedData, InquiryEndedData, InquiryEvent, InquiryRevisedData,
    InquirySubmittedData, ReplyAcceptedData, ReplyDeletedData, ReplyEditedData,
};
pub use status::{InquiryStatus, ReplyStatus};
pub use view::InquiryView;

use common::{OrganizationId, ReplyId};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum InquiryError {
    #[error("Inquiry already submitted")]
    AlreadySubmitted,

    #[error("Inquiry has been deleted")]
    Deleted,

    #[error("Inquiry description cannot be empty")]
    EmptyDescription,

    #[error("Reply text cannot be empty")]
    EmptyReply,

    #[error("At most {max} attachments allowed, got {got}")]
    TooManyAttachments { max: usize, got: usize },

    #[error("Requester {0} is required")]
    MissingContact(&'static str),

    #[error("Only the requester may do this")]
    NotRequester,

    #[error("Only the inquiry owner or an admin may do this")]
    NotOwner,

    #[error("Caller does not belong to an organization")]
    NoOrganization,

    #[error("Only the replying organization or an admin may change this reply")]
    NotReplyOwner,

    #[error("Inquiry is not visible to the caller")]
    NotVisible,

    #[error("Organization {0} already replied to this inquiry")]
    DuplicateReply(OrganizationId),

    #[error("Reply not found: {0}")]
    ReplyNotFound(ReplyId),

    #[error("Inquiry cannot move from {from} to {to}")]
    InvalidTransition {
        from: InquiryStatus,
        to: InquiryStatus,
    },

    #[error("Inquiry has ended")]
    Ended,

    #[error("Inquiry is {0}, changes require it to be active")]
    NotActive(InquiryStatus),

    #[error("Reply is {0}, only pending replies may be edited")]
    ReplyNotPending(ReplyStatus),

    #[error("An accepted reply cannot be deleted")]
    ReplyAccepted,
}

impl InquiryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InquiryError::AlreadySubmitted | InquiryError::DuplicateReply(_) => ErrorKind::Conflict,
            InquiryError::Deleted | InquiryError::ReplyNotFound(_) => ErrorKind::NotFound,
            InquiryError::EmptyDescription
            | InquiryError::EmptyReply
            | InquiryError::TooManyAttachments { .. }
            | InquiryError::MissingContact(_) => ErrorKind::InvalidInput,
            InquiryError::NotRequester
            | InquiryError::NotOwner
            | InquiryError::NoOrganization
            | InquiryError::NotReplyOwner
            | InquiryError::NotVisible => ErrorKind::Forbidden,
            InquiryError::InvalidTransition { .. }
            | InquiryError::Ended
            | InquiryError::NotActive(_)
            | InquiryError::ReplyNotPending(_)
            | InquiryError::ReplyAccepted => ErrorKind::InvalidStateTransition,
        }
    }
}
