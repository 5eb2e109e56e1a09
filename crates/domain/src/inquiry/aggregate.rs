use chrono::{DateTime, Utc};
use common::{AggregateId, Caller, CallerProfile, InquiryId, OrganizationId, ReplyId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AcceptanceRejectedData, InquiryEndedData, InquiryError, InquiryEvent, InquiryRevisedData,
    InquiryStatus, InquirySubmittedData, ReplyAcceptedData, ReplyDeletedData, ReplyEditedData,
    ReplyStatus,
};

/// Upper bound on media references attached to one inquiry.
pub const MAX_ATTACHMENTS: usize = 5;

/// Requester contact snapshot taken at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterContact {
    pub name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitInquiry {
    pub description: String,
    /// Already-uploaded media references.
    pub media: Vec<String>,
    /// Used only where the caller's profile has no value.
    pub contact: CallerProfile,
}

#[derive(Debug, Clone, Default)]
pub struct ReviseInquiry {
    pub description: Option<String>,
    pub media: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    pub organization_id: OrganizationId,
    pub author: UserId,
    pub text: String,
    pub status: ReplyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inquiry {
    id: Option<InquiryId>,
    #[serde(default)]
    version: Version,
    requester: Option<UserId>,
    contact: RequesterContact,
    description: String,
    media: Vec<String>,
    replies: Vec<Reply>,
    accepted_reply_id: Option<ReplyId>,
    status: InquiryStatus,
    deleted: bool,
    submitted_at: Option<DateTime<Utc>>,
}

impl Aggregate for Inquiry {
    type Event = InquiryEvent;
    type Error = InquiryError;

    fn aggregate_type() -> &'static str {
        "Inquiry"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            InquiryEvent::InquirySubmitted(data) => {
                self.id = Some(data.inquiry_id);
                self.requester = Some(data.requester);
                self.contact = data.contact;
                self.description = data.description;
                self.media = data.media;
                self.status = InquiryStatus::Active;
                self.submitted_at = Some(data.submitted_at);
            }
            InquiryEvent::InquiryRevised(data) => {
                self.description = data.description;
                self.media = data.media;
            }
            InquiryEvent::ReplyAdded(reply) => self.replies.push(reply),
            InquiryEvent::ReplyEdited(data) => {
                if let Some(reply) = self.replies.iter_mut().find(|r| r.id == data.reply_id) {
                    reply.text = data.text;
                }
            }
            InquiryEvent::ReplyAccepted(data) => {
                for reply in &mut self.replies {
                    if reply.id == data.reply_id {
                        reply.status = ReplyStatus::Accepted;
                    } else if reply.status == ReplyStatus::Pending {
                        reply.status = ReplyStatus::Rejected;
                    }
                }
                self.accepted_reply_id = Some(data.reply_id);
                self.status = InquiryStatus::Accepted;
            }
            InquiryEvent::AcceptanceRejected(_) => {
                for reply in &mut self.replies {
                    reply.status = ReplyStatus::Pending;
                }
                self.accepted_reply_id = None;
                self.status = InquiryStatus::Active;
            }
            InquiryEvent::InquiryEnded(_) => self.status = InquiryStatus::Ended,
            InquiryEvent::ReplyDeleted(data) => self.replies.retain(|r| r.id != data.reply_id),
            InquiryEvent::InquiryDeleted(_) => self.deleted = true,
        }
    }

    fn exists(&self) -> bool {
        self.id.is_some() && !self.deleted
    }
}

impl Inquiry {
    pub fn inquiry_id(&self) -> Option<InquiryId> {
        self.id
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }

    pub fn contact(&self) -> &RequesterContact {
        &self.contact
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn media(&self) -> &[String] {
        &self.media
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn reply(&self, reply_id: ReplyId) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }

    pub fn reply_from(&self, organization_id: &OrganizationId) -> Option<&Reply> {
        self.replies
            .iter()
            .find(|r| &r.organization_id == organization_id)
    }

    pub fn accepted_reply(&self) -> Option<&Reply> {
        self.accepted_reply_id.and_then(|id| self.reply(id))
    }

    pub fn accepted_reply_id(&self) -> Option<ReplyId> {
        self.accepted_reply_id
    }

    pub fn status(&self) -> InquiryStatus {
        self.status
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn is_requester(&self, caller: &Caller) -> bool {
        self.requester == Some(caller.user_id)
    }

    /// Creates the inquiry in `active`.
    ///
    /// Contact fields come from the caller's profile first and fall back to
    /// the values given in `input`.
    pub fn submit(
        &self,
        inquiry_id: InquiryId,
        caller: &Caller,
        input: SubmitInquiry,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        if self.id.is_some() {
            return Err(InquiryError::AlreadySubmitted);
        }
        let description = non_empty(input.description).ok_or(InquiryError::EmptyDescription)?;
        check_attachments(&input.media)?;

        let profile = &caller.profile;
        let pick = |own: &Option<String>, given: Option<String>, field: &'static str| {
            own.clone()
                .and_then(non_empty)
                .or_else(|| given.and_then(non_empty))
                .ok_or(InquiryError::MissingContact(field))
        };
        let contact = RequesterContact {
            name: pick(&profile.name, input.contact.name, "name")?,
            email: pick(&profile.email, input.contact.email, "email")?,
            phone_number: pick(&profile.phone_number, input.contact.phone_number, "phone number")?,
        };

        Ok(vec![InquiryEvent::InquirySubmitted(InquirySubmittedData {
            inquiry_id,
            requester: caller.user_id,
            contact,
            description,
            media: input.media,
            submitted_at: Utc::now(),
        })])
    }

    pub fn revise(
        &self,
        caller: &Caller,
        input: ReviseInquiry,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        if !self.is_requester(caller) && !caller.is_admin() {
            return Err(InquiryError::NotOwner);
        }
        self.ensure_open()?;
        if self.status != InquiryStatus::Active && !caller.is_admin() {
            return Err(InquiryError::NotActive(self.status));
        }

        let description = match input.description {
            Some(d) => non_empty(d).ok_or(InquiryError::EmptyDescription)?,
            None => self.description.clone(),
        };
        let media = match input.media {
            Some(media) => {
                check_attachments(&media)?;
                media
            }
            None => self.media.clone(),
        };

        Ok(vec![InquiryEvent::InquiryRevised(InquiryRevisedData {
            description,
            media,
            revised_at: Utc::now(),
        })])
    }

    /// Appends a `pending` reply from the caller's organization.
    pub fn add_reply(
        &self,
        reply_id: ReplyId,
        caller: &Caller,
        text: String,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        let organization_id = caller
            .organization_id
            .clone()
            .ok_or(InquiryError::NoOrganization)?;
        self.ensure_open()?;
        if self.reply_from(&organization_id).is_some() {
            return Err(InquiryError::DuplicateReply(organization_id));
        }
        let text = non_empty(text).ok_or(InquiryError::EmptyReply)?;

        Ok(vec![InquiryEvent::ReplyAdded(Reply {
            id: reply_id,
            organization_id,
            author: caller.user_id,
            text,
            status: ReplyStatus::Pending,
            created_at: Utc::now(),
        })])
    }

    pub fn edit_reply(
        &self,
        reply_id: ReplyId,
        caller: &Caller,
        text: String,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        let reply = self.find_reply(reply_id)?;
        ensure_reply_owner(reply, caller)?;
        self.ensure_open()?;
        if !caller.is_admin() {
            if self.status != InquiryStatus::Active {
                return Err(InquiryError::NotActive(self.status));
            }
            if reply.status != ReplyStatus::Pending {
                return Err(InquiryError::ReplyNotPending(reply.status));
            }
        }
        let text = non_empty(text).ok_or(InquiryError::EmptyReply)?;

        Ok(vec![InquiryEvent::ReplyEdited(ReplyEditedData {
            reply_id,
            text,
            edited_at: Utc::now(),
        })])
    }

    /// Makes `reply_id` the single winner and rejects every pending rival.
    pub fn accept_reply(
        &self,
        reply_id: ReplyId,
        caller: &Caller,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        self.ensure_requester(caller)?;
        self.find_reply(reply_id)?;
        self.ensure_transition(InquiryStatus::Accepted)?;

        Ok(vec![InquiryEvent::ReplyAccepted(ReplyAcceptedData {
            reply_id,
            accepted_at: Utc::now(),
        })])
    }

    /// Returns every reply to `pending` and the inquiry to `active`.
    pub fn reject_acceptance(&self, caller: &Caller) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        self.ensure_requester(caller)?;
        self.revert_acceptance()
    }

    pub fn end(&self, caller: &Caller) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        self.ensure_requester(caller)?;
        self.ensure_transition(InquiryStatus::Ended)?;
        Ok(vec![InquiryEvent::InquiryEnded(InquiryEndedData {
            at: Utc::now(),
        })])
    }

    /// Owner while `active`; admin in any status.
    pub fn delete(&self, caller: &Caller) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        if caller.is_admin() {
            return Ok(vec![InquiryEvent::InquiryDeleted(InquiryEndedData {
                at: Utc::now(),
            })]);
        }
        if !self.is_requester(caller) {
            return Err(InquiryError::NotOwner);
        }
        self.ensure_open()?;
        if self.status != InquiryStatus::Active {
            return Err(InquiryError::NotActive(self.status));
        }
        Ok(vec![InquiryEvent::InquiryDeleted(InquiryEndedData {
            at: Utc::now(),
        })])
    }

    /// Removes one reply. An admin removing the accepted reply also
    /// reverts the acceptance so no dangling winner remains.
    pub fn delete_reply(
        &self,
        reply_id: ReplyId,
        caller: &Caller,
    ) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_live()?;
        let reply = self.find_reply(reply_id)?;
        ensure_reply_owner(reply, caller)?;
        self.ensure_open()?;

        let mut events = Vec::new();
        if reply.status == ReplyStatus::Accepted {
            if !caller.is_admin() {
                return Err(InquiryError::ReplyAccepted);
            }
            events.extend(self.revert_acceptance()?);
        }
        events.push(InquiryEvent::ReplyDeleted(ReplyDeletedData {
            reply_id,
            deleted_at: Utc::now(),
        }));
        Ok(events)
    }

    fn revert_acceptance(&self) -> Result<Vec<InquiryEvent>, InquiryError> {
        self.ensure_transition(InquiryStatus::Active)?;
        let reply_id = self.accepted_reply_id.ok_or(InquiryError::InvalidTransition {
            from: self.status,
            to: InquiryStatus::Active,
        })?;
        Ok(vec![InquiryEvent::AcceptanceRejected(
            AcceptanceRejectedData {
                reply_id,
                rejected_at: Utc::now(),
            },
        )])
    }

    fn find_reply(&self, reply_id: ReplyId) -> Result<&Reply, InquiryError> {
        self.reply(reply_id)
            .ok_or(InquiryError::ReplyNotFound(reply_id))
    }

    fn ensure_live(&self) -> Result<(), InquiryError> {
        if self.deleted {
            return Err(InquiryError::Deleted);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), InquiryError> {
        if self.status == InquiryStatus::Ended {
            return Err(InquiryError::Ended);
        }
        Ok(())
    }

    fn ensure_requester(&self, caller: &Caller) -> Result<(), InquiryError> {
        if !self.is_requester(caller) {
            return Err(InquiryError::NotRequester);
        }
        Ok(())
    }

    fn ensure_transition(&self, to: InquiryStatus) -> Result<(), InquiryError> {
        if self.status == InquiryStatus::Ended {
            return Err(InquiryError::Ended);
        }
        if !self.status.can_transition_to(to) {
            return Err(InquiryError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

fn ensure_reply_owner(reply: &Reply, caller: &Caller) -> Result<(), InquiryError> {
    let same_org = caller.organization_id.as_ref() == Some(&reply.organization_id);
    if !same_org && !caller.is_admin() {
        return Err(InquiryError::NotReplyOwner);
    }
    Ok(())
}

fn check_attachments(media: &[String]) -> Result<(), InquiryError> {
    if media.len() > MAX_ATTACHMENTS {
        return Err(InquiryError::TooManyAttachments {
            max: MAX_ATTACHMENTS,
            got: media.len(),
        });
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
