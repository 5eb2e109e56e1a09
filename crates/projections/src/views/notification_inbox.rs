//! Per-caller notification inbox.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Caller, NotificationId};
use domain::notification::{NotificationEvent, NotificationTarget, Severity};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub id: NotificationId,
    pub target: NotificationTarget,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

struct InboxState {
    entries: HashMap<AggregateId, InboxEntry>,
    position: ProjectionPosition,
}

/// Live notifications; deleted ones drop out.
#[derive(Clone)]
pub struct NotificationInboxView {
    state: Arc<RwLock<InboxState>>,
}

impl NotificationInboxView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(InboxState {
                entries: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Notifications addressed to `caller` directly or through its role,
    /// newest first.
    pub async fn inbox(&self, caller: &Caller) -> Vec<InboxEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|e| e.target.includes(caller))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub async fn unread_count(&self, caller: &Caller) -> usize {
        self.state
            .read()
            .await
            .entries
            .values()
            .filter(|e| !e.read && e.target.includes(caller))
            .count()
    }
}

impl Default for NotificationInboxView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for NotificationInboxView {
    fn name(&self) -> &'static str {
        "NotificationInboxView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        if event.aggregate_type == "Notification" {
            match serde_json::from_value(event.payload.clone()) {
                Ok(NotificationEvent::NotificationEnqueued(record)) => {
                    state.entries.insert(
                        event.aggregate_id,
                        InboxEntry {
                            id: record.id,
                            target: record.target,
                            title: record.title,
                            message: record.message,
                            severity: record.severity,
                            created_at: record.created_at,
                            read: false,
                        },
                    );
                }
                Ok(NotificationEvent::NotificationRead(_)) => {
                    if let Some(entry) = state.entries.get_mut(&event.aggregate_id) {
                        entry.read = true;
                    }
                }
                Ok(NotificationEvent::NotificationDeleted(_)) => {
                    state.entries.remove(&event.aggregate_id);
                }
                Err(e) => {
                    state.position = state.position.advance();
                    return Err(e.into());
                }
            }
        }
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for NotificationInboxView {
    fn name(&self) -> &'static str {
        "NotificationInboxView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.entries.len()).unwrap_or(0)
    }
}
