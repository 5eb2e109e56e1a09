//! Inquiry listings, scoped per caller at read time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, Caller};
use domain::Aggregate;
use domain::inquiry::{Inquiry, InquiryEvent, InquiryView};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

struct InquiryBoardState {
    inquiries: HashMap<AggregateId, Inquiry>,
    position: ProjectionPosition,
}

/// Holds every live inquiry folded from its events. Redaction happens in
/// [`InquiryBoardView::list`], so one copy serves every role.
#[derive(Clone)]
pub struct InquiryBoardView {
    state: Arc<RwLock<InquiryBoardState>>,
}

impl InquiryBoardView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(InquiryBoardState {
                inquiries: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Inquiries `caller` may list, as `caller` may see them, newest first.
    pub async fn list(&self, caller: &Caller) -> Vec<InquiryView> {
        let state = self.state.read().await;
        let mut views: Vec<_> = state
            .inquiries
            .values()
            .filter(|i| i.is_listed_for(caller))
            .filter_map(|i| i.view_for(caller).ok())
            .collect();
        views.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        views
    }
}

impl Default for InquiryBoardView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for InquiryBoardView {
    fn name(&self) -> &'static str {
        "InquiryBoardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance();
        if event.aggregate_type != Inquiry::aggregate_type() {
            return Ok(());
        }

        let inquiry_event: InquiryEvent = serde_json::from_value(event.payload.clone())?;
        let deleted = matches!(inquiry_event, InquiryEvent::InquiryDeleted(_));
        if deleted {
            state.inquiries.remove(&event.aggregate_id);
            return Ok(());
        }

        let inquiry = state.inquiries.entry(event.aggregate_id).or_default();
        inquiry.apply(inquiry_event);
        inquiry.set_version(event.version);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.inquiries.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for InquiryBoardView {
    fn name(&self) -> &'static str {
        "InquiryBoardView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.inquiries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use common::{CallerProfile, InquiryId, OrganizationId, ReplyId, Role, UserId};
    use domain::DomainEvent;
    use domain::inquiry::SubmitInquiry;
    use event_store::Version;

    use super::*;

    struct Board {
        view: InquiryBoardView,
        inquiry: Inquiry,
        id: AggregateId,
    }

    impl Board {
        async fn submitted(requester: &Caller) -> Self {
            let inquiry_id = InquiryId::new();
            let mut board = Self {
                view: InquiryBoardView::new(),
                inquiry: Inquiry::default(),
                id: inquiry_id.into(),
            };
            let events = board
                .inquiry
                .submit(
                    inquiry_id,
                    requester,
                    SubmitInquiry {
                        description: "Need 40 office chairs".into(),
                        ..Default::default()
                    },
                )
                .unwrap();
            board.record(events).await;
            board
        }

        async fn record(&mut self, events: Vec<InquiryEvent>) {
            for event in events {
                let version = self.inquiry.version().next();
                let envelope = EventEnvelope::from_payload(
                    self.id,
                    "Inquiry",
                    event.event_type(),
                    version,
                    &event,
                )
                .unwrap();
                self.inquiry.apply(event);
                self.inquiry.set_version(version);
                self.view.handle(&envelope).await.unwrap();
            }
        }
    }

    fn requester() -> Caller {
        Caller::user(UserId::new()).with_profile(CallerProfile {
            name: Some("Mona Adel".into()),
            email: Some("mona@example.com".into()),
            phone_number: Some("01012345678".into()),
        })
    }

    fn org(name: &str) -> Caller {
        Caller::new(UserId::new(), Role::Operation).with_organization(OrganizationId::new(name))
    }

    #[tokio::test]
    async fn lists_scoped_per_caller() {
        let owner = requester();
        let mut board = Board::submitted(&owner).await;
        let acme = org("acme");
        let reply_id = ReplyId::new();
        let events = board
            .inquiry
            .add_reply(reply_id, &acme, "We can do 40 for 2000".into())
            .unwrap();
        board.record(events).await;
        let events = board
            .inquiry
            .add_reply(ReplyId::new(), &org("globex"), "35 only".into())
            .unwrap();
        board.record(events).await;

        assert_eq!(board.view.list(&owner).await[0].replies.len(), 2);
        assert!(board.view.list(&requester()).await.is_empty());

        let seen_by_acme = board.view.list(&acme).await;
        assert_eq!(seen_by_acme[0].replies.len(), 1);
        assert!(seen_by_acme[0].contact.is_none());

        let events = board.inquiry.accept_reply(reply_id, &owner).unwrap();
        board.record(events).await;
        assert!(board.view.list(&acme).await[0].contact.is_some());
        assert!(board.view.list(&org("initech")).await.is_empty());
    }

    #[tokio::test]
    async fn deleted_inquiries_drop_out() {
        let owner = requester();
        let mut board = Board::submitted(&owner).await;
        assert_eq!(ReadModel::count(&board.view), 1);

        let events = board.inquiry.delete(&owner).unwrap();
        board.record(events).await;
        assert!(board.view.list(&owner).await.is_empty());
        assert_eq!(ReadModel::count(&board.view), 0);
    }

    #[tokio::test]
    async fn reset_forgets_everything() {
        let board = Board::submitted(&requester()).await;
        board.view.reset().await.unwrap();
        assert_eq!(board.view.position().await.events_processed, 0);
        assert_eq!(ReadModel::count(&board.view), 0);
    }

    #[tokio::test]
    async fn other_streams_only_advance() {
        let view = InquiryBoardView::new();
        let other = EventEnvelope::new(
            AggregateId::new(),
            "Order",
            "OrderPlaced",
            Version::first(),
            serde_json::json!({}),
        );
        view.handle(&other).await.unwrap();
        assert_eq!(view.position().await.events_processed, 1);
    }
}
