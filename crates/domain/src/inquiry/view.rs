//! Role-scoped read projection of an inquiry. Computed per read, never
//! stored.

use chrono::{DateTime, Utc};
use common::{Caller, InquiryId, ReplyId, Role, UserId};
use serde::Serialize;

use crate::aggregate::Aggregate;

use super::{Inquiry, InquiryError, InquiryStatus, Reply, RequesterContact};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InquiryView {
    pub id: InquiryId,
    pub status: InquiryStatus,
    pub description: String,
    pub media: Vec<String>,
    /// `None` when redacted for the viewer.
    pub requester: Option<UserId>,
    /// `None` when redacted for the viewer.
    pub contact: Option<RequesterContact>,
    pub accepted_reply_id: Option<ReplyId>,
    pub replies: Vec<Reply>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Inquiry {
    /// Whether the inquiry belongs in `caller`'s listing.
    ///
    /// Requesters list their own inquiries; organizations list every
    /// `active` inquiry plus closed ones carrying their own reply; admins
    /// list everything.
    pub fn is_listed_for(&self, caller: &Caller) -> bool {
        if !self.exists() {
            return false;
        }
        match caller.role {
            Role::Admin => true,
            Role::User => self.is_requester(caller),
            Role::Operation => match self.status() {
                InquiryStatus::Active => true,
                InquiryStatus::Accepted | InquiryStatus::Ended => caller
                    .organization_id
                    .as_ref()
                    .is_some_and(|org| self.reply_from(org).is_some()),
            },
        }
    }

    /// The inquiry as `caller` may see it.
    ///
    /// Organizations see only their own reply and see requester contact
    /// only once their reply is the accepted one.
    pub fn view_for(&self, caller: &Caller) -> Result<InquiryView, InquiryError> {
        let id = self.inquiry_id().ok_or(InquiryError::Deleted)?;
        if !self.exists() {
            return Err(InquiryError::Deleted);
        }
        if !self.is_listed_for(caller) {
            return Err(InquiryError::NotVisible);
        }

        let mut view = InquiryView {
            id,
            status: self.status(),
            description: self.description().to_string(),
            media: self.media().to_vec(),
            requester: self.requester(),
            contact: Some(self.contact().clone()),
            accepted_reply_id: self.accepted_reply_id(),
            replies: self.replies().to_vec(),
            submitted_at: self.submitted_at(),
        };

        if caller.role == Role::Operation {
            let own_org = caller.organization_id.as_ref();
            let is_winner = own_org.is_some()
                && self.accepted_reply().map(|r| &r.organization_id) == own_org;
            if !is_winner {
                view.requester = None;
                view.contact = None;
            }
            view.replies
                .retain(|r| Some(&r.organization_id) == own_org);
        }
        Ok(view)
    }
}
