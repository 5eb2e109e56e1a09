use common::{Caller, InquiryId, ReplyId, Role};
use domain::inquiry::{
    Inquiry, InquiryError, InquiryEvent, InquiryView, Reply, ReviseInquiry, SubmitInquiry,
};
use domain::notification::{NotificationTarget, OutboundDispatcher, Severity, enqueue};
use domain::{
    Aggregate, DEFAULT_MAX_ATTEMPTS, DomainError, Transaction, load_aggregate, retry_on_conflict,
};
use event_store::EventStore;

pub struct InquiryEngine<S: EventStore> {
    store: S,
    outbound: OutboundDispatcher,
    max_attempts: u32,
}

impl<S: EventStore> InquiryEngine<S> {
    pub fn new(store: S, outbound: OutboundDispatcher) -> Self {
        Self {
            store,
            outbound,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Creates an inquiry in `active` and tells operations about it in the
    /// same commit.
    #[tracing::instrument(skip(self, caller, input), fields(user_id = %caller.user_id))]
    pub async fn submit(
        &self,
        caller: &Caller,
        input: SubmitInquiry,
    ) -> Result<InquiryView, DomainError> {
        let inquiry_id = InquiryId::new();
        let mut tx = Transaction::begin(&self.store).on_behalf_of(caller.user_id);
        let mut inquiry = Inquiry::default();
        let events = inquiry.submit(inquiry_id, caller, input)?;
        tx.stage(&mut inquiry, events)?;
        enqueue(
            &mut tx,
            NotificationTarget::Role(Role::Operation),
            "New inquiry",
            "A new inquiry is waiting for offers",
            Severity::Info,
        )?;
        let committed = tx.commit().await?;
        self.outbound.flush(&committed.outbox).await;

        metrics::counter!("inquiries_submitted_total").increment(1);
        tracing::info!(%inquiry_id, "inquiry submitted");
        Ok(inquiry.view_for(caller)?)
    }

    /// The inquiry as the caller may see it.
    pub async fn get(&self, caller: &Caller, id: InquiryId) -> Result<InquiryView, DomainError> {
        let inquiry: Inquiry = load_aggregate(&self.store, id.into()).await?;
        if !inquiry.exists() {
            return Err(DomainError::not_found("Inquiry", id));
        }
        Ok(inquiry.view_for(caller)?)
    }

    #[tracing::instrument(skip(self, caller, input), fields(user_id = %caller.user_id))]
    pub async fn revise(
        &self,
        caller: &Caller,
        id: InquiryId,
        input: ReviseInquiry,
    ) -> Result<InquiryView, DomainError> {
        let inquiry = self
            .mutate(caller, id, "inquiry_revise", |inquiry| {
                inquiry.revise(caller, input.clone())
            })
            .await?;
        Ok(inquiry.view_for(caller)?)
    }

    /// Appends a pending reply from the caller's organization, then lets
    /// the requester know on a best-effort basis.
    #[tracing::instrument(skip(self, caller, text), fields(user_id = %caller.user_id, organization_id = ?caller.organization_id))]
    pub async fn add_reply(
        &self,
        caller: &Caller,
        id: InquiryId,
        text: String,
    ) -> Result<Reply, DomainError> {
        let reply_id = ReplyId::new();
        let inquiry = self
            .mutate(caller, id, "inquiry_add_reply", |inquiry| {
                inquiry.add_reply(reply_id, caller, text.clone())
            })
            .await?;
        let reply = inquiry
            .reply(reply_id)
            .cloned()
            .ok_or(InquiryError::ReplyNotFound(reply_id))?;

        metrics::counter!("inquiry_replies_total").increment(1);
        tracing::info!(inquiry_id = %id, %reply_id, organization_id = %reply.organization_id, "reply added");

        if let Some(requester) = inquiry.requester() {
            self.notify_best_effort(
                NotificationTarget::User(requester),
                "New reply",
                "An organization replied to your inquiry",
            )
            .await;
        }
        Ok(reply)
    }

    #[tracing::instrument(skip(self, caller, text), fields(user_id = %caller.user_id))]
    pub async fn edit_reply(
        &self,
        caller: &Caller,
        id: InquiryId,
        reply_id: ReplyId,
        text: String,
    ) -> Result<Reply, DomainError> {
        let inquiry = self
            .mutate(caller, id, "inquiry_edit_reply", |inquiry| {
                inquiry.edit_reply(reply_id, caller, text.clone())
            })
            .await?;
        Ok(inquiry
            .reply(reply_id)
            .cloned()
            .ok_or(InquiryError::ReplyNotFound(reply_id))?)
    }

    /// Makes `reply_id` the winner. The winning side is told best-effort.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn accept_reply(
        &self,
        caller: &Caller,
        id: InquiryId,
        reply_id: ReplyId,
    ) -> Result<InquiryView, DomainError> {
        let inquiry = self
            .mutate(caller, id, "inquiry_accept_reply", |inquiry| {
                inquiry.accept_reply(reply_id, caller)
            })
            .await?;
        tracing::info!(inquiry_id = %id, %reply_id, "reply accepted");

        self.notify_best_effort(
            NotificationTarget::Role(Role::Operation),
            "Reply accepted",
            "A requester accepted your offer",
        )
        .await;
        Ok(inquiry.view_for(caller)?)
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn reject_acceptance(
        &self,
        caller: &Caller,
        id: InquiryId,
    ) -> Result<InquiryView, DomainError> {
        let inquiry = self
            .mutate(caller, id, "inquiry_reject_acceptance", |inquiry| {
                inquiry.reject_acceptance(caller)
            })
            .await?;
        tracing::info!(inquiry_id = %id, "acceptance rejected");
        Ok(inquiry.view_for(caller)?)
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn end(&self, caller: &Caller, id: InquiryId) -> Result<InquiryView, DomainError> {
        let inquiry = self
            .mutate(caller, id, "inquiry_end", |inquiry| inquiry.end(caller))
            .await?;
        tracing::info!(inquiry_id = %id, "inquiry ended");
        Ok(inquiry.view_for(caller)?)
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete(&self, caller: &Caller, id: InquiryId) -> Result<(), DomainError> {
        self.mutate(caller, id, "inquiry_delete", |inquiry| inquiry.delete(caller))
            .await?;
        tracing::info!(inquiry_id = %id, "inquiry deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete_reply(
        &self,
        caller: &Caller,
        id: InquiryId,
        reply_id: ReplyId,
    ) -> Result<(), DomainError> {
        self.mutate(caller, id, "inquiry_delete_reply", |inquiry| {
            inquiry.delete_reply(reply_id, caller)
        })
        .await?;
        tracing::info!(inquiry_id = %id, %reply_id, "reply deleted");
        Ok(())
    }

    /// Loads the inquiry in a fresh transaction, stages what `command`
    /// decides and commits; retried when another writer got there first.
    async fn mutate<F>(
        &self,
        caller: &Caller,
        id: InquiryId,
        operation: &'static str,
        command: F,
    ) -> Result<Inquiry, DomainError>
    where
        F: Fn(&Inquiry) -> Result<Vec<InquiryEvent>, InquiryError>,
    {
        let store = &self.store;
        let command = &command;
        retry_on_conflict(operation, self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store).on_behalf_of(caller.user_id);
            let mut inquiry: Inquiry = tx.load_existing(id.into(), "Inquiry").await?;
            let events = command(&inquiry)?;
            tx.stage(&mut inquiry, events)?;
            tx.commit().await?;
            Ok(inquiry)
        })
        .await
    }

    /// Records and delivers a notification whose failure must not undo the
    /// change it reports.
    async fn notify_best_effort(&self, target: NotificationTarget, title: &str, message: &str) {
        let mut tx = Transaction::begin(&self.store);
        let committed = match enqueue(&mut tx, target, title, message, Severity::Info) {
            Ok(_) => tx.commit().await,
            Err(e) => Err(e),
        };
        match committed {
            Ok(committed) => {
                self.outbound.flush(&committed.outbox).await;
            }
            Err(e) => {
                tracing::warn!(%target, error = %e, "secondary notification dropped");
                metrics::counter!("notifications_failed_total").increment(1);
            }
        }
    }
}
