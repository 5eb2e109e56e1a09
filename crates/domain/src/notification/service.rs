use common::{Caller, NotificationId};
use event_store::EventStore;

use crate::error::DomainError;
use crate::transaction::{DEFAULT_MAX_ATTEMPTS, Transaction, load_aggregate, retry_on_conflict};

use super::{Notification, NotificationError, NotificationEvent, NotificationRecord};

/// Inbox-side operations on notifications.
///
/// Listing lives in the inbox projection; this service owns the writes.
pub struct NotificationService<S: EventStore> {
    store: S,
    max_attempts: u32,
}

impl<S: EventStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub async fn get(
        &self,
        caller: &Caller,
        id: NotificationId,
    ) -> Result<Notification, DomainError> {
        let notification: Notification = load_aggregate(&self.store, id.into()).await?;
        if notification.record().is_none() || notification.is_deleted() {
            return Err(DomainError::not_found("Notification", id));
        }
        if !notification.is_addressed_to(caller) {
            return Err(NotificationError::NotAddressed.into());
        }
        Ok(notification)
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn mark_read(
        &self,
        caller: &Caller,
        id: NotificationId,
    ) -> Result<NotificationRecord, DomainError> {
        self.mutate(caller, id, "notification_mark_read", Notification::mark_read)
            .await
    }

    /// Marks every listed notification read in one commit.
    ///
    /// Ids that are deleted, unknown, or not addressed to the caller are
    /// skipped. Returns how many notifications changed.
    #[tracing::instrument(skip(self, caller, ids), fields(user_id = %caller.user_id, count = ids.len()))]
    pub async fn mark_all_read(
        &self,
        caller: &Caller,
        ids: &[NotificationId],
    ) -> Result<usize, DomainError> {
        self.mutate_all(caller, ids, "notification_mark_all_read", Notification::mark_read)
            .await
    }

    /// Deletes every listed notification in one commit, with the same
    /// skipping rules as [`Self::mark_all_read`]. Returns how many were
    /// deleted.
    #[tracing::instrument(skip(self, caller, ids), fields(user_id = %caller.user_id, count = ids.len()))]
    pub async fn delete_all(
        &self,
        caller: &Caller,
        ids: &[NotificationId],
    ) -> Result<usize, DomainError> {
        self.mutate_all(caller, ids, "notification_delete_all", Notification::delete)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete(
        &self,
        caller: &Caller,
        id: NotificationId,
    ) -> Result<NotificationRecord, DomainError> {
        self.mutate(caller, id, "notification_delete", Notification::delete)
            .await
    }

    async fn mutate_all<F>(
        &self,
        caller: &Caller,
        ids: &[NotificationId],
        operation: &'static str,
        command: F,
    ) -> Result<usize, DomainError>
    where
        F: Fn(&Notification, &Caller) -> Result<Vec<NotificationEvent>, NotificationError>,
    {
        let store = &self.store;
        let command = &command;
        retry_on_conflict(operation, self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store).on_behalf_of(caller.user_id);
            let mut changed = 0;
            for id in ids {
                let mut notification: Notification = tx.load((*id).into()).await?;
                let Ok(events) = command(&notification, caller) else {
                    continue;
                };
                if !events.is_empty() {
                    tx.stage(&mut notification, events)?;
                    changed += 1;
                }
            }
            tx.commit().await?;
            Ok(changed)
        })
        .await
    }

    async fn mutate<F>(
        &self,
        caller: &Caller,
        id: NotificationId,
        operation: &'static str,
        command: F,
    ) -> Result<NotificationRecord, DomainError>
    where
        F: Fn(&Notification, &Caller) -> Result<Vec<NotificationEvent>, NotificationError>,
    {
        let store = &self.store;
        let command = &command;
        retry_on_conflict(operation, self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store).on_behalf_of(caller.user_id);
            let mut notification: Notification =
                tx.load_existing(id.into(), "Notification").await?;
            let events = command(&notification, caller)?;
            tx.stage(&mut notification, events)?;
            tx.commit().await?;

            notification
                .record()
                .cloned()
                .ok_or_else(|| DomainError::not_found("Notification", id))
        })
        .await
    }
}
