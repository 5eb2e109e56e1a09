//! Outbound delivery of committed notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{Role, UserId};
use thiserror::Error;

use super::{NotificationRecord, NotificationTarget};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    #[error("Recipient rejected: {0}")]
    Rejected(String),
}

/// External side channel (email, push) reaching one user.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        recipient: UserId,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError>;
}

/// Resolves a role-class to its current members.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn members(&self, role: Role) -> Result<Vec<UserId>, DeliveryError>;
}

/// Outcome of one [`OutboundDispatcher::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Post-commit hook that fans committed notifications out to recipients.
///
/// Never fails: the business change that produced the notifications is
/// already durable, so delivery problems are logged and counted only.
#[derive(Clone)]
pub struct OutboundDispatcher {
    channel: Arc<dyn DeliveryChannel>,
    directory: Arc<dyn RecipientDirectory>,
}

impl OutboundDispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>, directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { channel, directory }
    }

    /// Dispatcher with an in-memory channel and an empty directory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryDeliveryChannel::new()),
            Arc::new(InMemoryDirectory::new()),
        )
    }

    pub async fn flush(&self, outbox: &[NotificationRecord]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for record in outbox {
            let recipients = match record.target {
                NotificationTarget::User(user_id) => vec![user_id],
                NotificationTarget::Role(role) => match self.directory.members(role).await {
                    Ok(members) => members,
                    Err(e) => {
                        tracing::warn!(notification_id = %record.id, %role, error = %e, "could not resolve recipients");
                        metrics::counter!("notifications_failed_total").increment(1);
                        report.failed += 1;
                        continue;
                    }
                },
            };

            for recipient in recipients {
                match self.channel.deliver(recipient, record).await {
                    Ok(()) => {
                        metrics::counter!("notifications_delivered_total").increment(1);
                        report.delivered += 1;
                    }
                    Err(e) => {
                        tracing::warn!(notification_id = %record.id, %recipient, error = %e, "notification delivery failed");
                        metrics::counter!("notifications_failed_total").increment(1);
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "outbox flushed"
        );
        report
    }
}

impl std::fmt::Debug for OutboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundDispatcher").finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ChannelState {
    sent: Vec<(UserId, NotificationRecord)>,
    fail_on_send: bool,
}

/// Channel that records deliveries in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliveryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryDeliveryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following delivery fail.
    pub fn set_fail_on_send(&self, fail: bool) {
        lock(&self.state).fail_on_send = fail;
    }

    pub fn sent(&self) -> Vec<(UserId, NotificationRecord)> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_to(&self, recipient: UserId) -> Vec<NotificationRecord> {
        lock(&self.state)
            .sent
            .iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for InMemoryDeliveryChannel {
    async fn deliver(
        &self,
        recipient: UserId,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        let mut state = lock(&self.state);
        if state.fail_on_send {
            return Err(DeliveryError::Unavailable("channel offline".to_string()));
        }
        state.sent.push((recipient, record.clone()));
        Ok(())
    }
}

/// Fixed role membership, seeded from configuration or tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    members: Arc<Mutex<HashMap<Role, Vec<UserId>>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(self, role: Role, users: impl IntoIterator<Item = UserId>) -> Self {
        for user in users {
            self.add_member(role, user);
        }
        self
    }

    pub fn add_member(&self, role: Role, user: UserId) {
        let mut members = lock(&self.members);
        let entry = members.entry(role).or_default();
        if !entry.contains(&user) {
            entry.push(user);
        }
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryDirectory {
    async fn members(&self, role: Role) -> Result<Vec<UserId>, DeliveryError> {
        Ok(lock(&self.members).get(&role).cloned().unwrap_or_default())
    }
}
