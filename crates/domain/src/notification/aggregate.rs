use chrono::{DateTime, Utc};
use common::{AggregateId, Caller, NotificationId, Role, UserId};
use event_store::{EventStore, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::transaction::Transaction;

use super::{NotificationDeletedData, NotificationError, NotificationEvent, NotificationReadData};

/// Recipient of a notification. A role-class is resolved to its members
/// only when the notification is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    User(UserId),
    Role(Role),
}

impl NotificationTarget {
    pub fn includes(&self, caller: &Caller) -> bool {
        match self {
            NotificationTarget::User(user_id) => *user_id == caller.user_id,
            NotificationTarget::Role(role) => *role == caller.role,
        }
    }
}

impl std::fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationTarget::User(user_id) => write!(f, "user:{user_id}"),
            NotificationTarget::Role(role) => write!(f, "role:{role}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// What `enqueue` hands back and what the outbound channel delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub target: NotificationTarget,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Stages a new notification in `tx` and queues it for outbound delivery
/// once `tx` commits.
pub fn enqueue<S: EventStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    target: NotificationTarget,
    title: impl Into<String>,
    message: impl Into<String>,
    severity: Severity,
) -> Result<NotificationRecord, DomainError> {
    let record = NotificationRecord {
        id: NotificationId::new(),
        target,
        title: title.into(),
        message: message.into(),
        severity,
        created_at: Utc::now(),
    };

    let mut notification = Notification::default();
    let events = notification.enqueue(record.clone())?;
    tx.stage(&mut notification, events)?;
    tx.defer_delivery(record.clone());
    Ok(record)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notification {
    record: Option<NotificationRecord>,
    #[serde(default)]
    version: Version,
    read: bool,
    deleted: bool,
}

impl Aggregate for Notification {
    type Event = NotificationEvent;
    type Error = NotificationError;

    fn aggregate_type() -> &'static str {
        "Notification"
    }

    fn id(&self) -> Option<AggregateId> {
        self.record.as_ref().map(|r| r.id.into())
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            NotificationEvent::NotificationEnqueued(record) => self.record = Some(record),
            NotificationEvent::NotificationRead(_) => self.read = true,
            NotificationEvent::NotificationDeleted(_) => self.deleted = true,
        }
    }
}

impl Notification {
    pub fn record(&self) -> Option<&NotificationRecord> {
        self.record.as_ref()
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_addressed_to(&self, caller: &Caller) -> bool {
        self.record
            .as_ref()
            .is_some_and(|r| r.target.includes(caller))
    }

    pub fn enqueue(
        &self,
        record: NotificationRecord,
    ) -> Result<Vec<NotificationEvent>, NotificationError> {
        if self.record.is_some() {
            return Err(NotificationError::AlreadyEnqueued);
        }
        if record.title.trim().is_empty() {
            return Err(NotificationError::EmptyTitle);
        }
        Ok(vec![NotificationEvent::NotificationEnqueued(record)])
    }

    /// Marks the notification read. Reading twice records nothing.
    pub fn mark_read(&self, caller: &Caller) -> Result<Vec<NotificationEvent>, NotificationError> {
        self.ensure_visible_to(caller)?;
        if self.read {
            return Ok(vec![]);
        }
        Ok(vec![NotificationEvent::NotificationRead(
            NotificationReadData {
                read_at: Utc::now(),
            },
        )])
    }

    pub fn delete(&self, caller: &Caller) -> Result<Vec<NotificationEvent>, NotificationError> {
        self.ensure_visible_to(caller)?;
        Ok(vec![NotificationEvent::NotificationDeleted(
            NotificationDeletedData {
                deleted_at: Utc::now(),
            },
        )])
    }

    fn ensure_visible_to(&self, caller: &Caller) -> Result<(), NotificationError> {
        if self.deleted {
            return Err(NotificationError::Deleted);
        }
        if !self.is_addressed_to(caller) {
            return Err(NotificationError::NotAddressed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enqueued(target: NotificationTarget) -> Notification {
        let mut notification = Notification::default();
        let events = notification
            .enqueue(NotificationRecord {
                id: NotificationId::new(),
                target,
                title: "Order created".into(),
                message: "Your order OR1 was created".into(),
                severity: Severity::Success,
                created_at: Utc::now(),
            })
            .unwrap();
        notification.apply_events(events);
        notification
    }

    #[test]
    fn role_target_includes_every_member_of_the_role() {
        let target = NotificationTarget::Role(Role::Operation);
        assert!(target.includes(&Caller::new(UserId::new(), Role::Operation)));
        assert!(!target.includes(&Caller::user(UserId::new())));
    }

    #[test]
    fn only_the_addressee_may_mark_read() {
        let owner = Caller::user(UserId::new());
        let mut notification = enqueued(NotificationTarget::User(owner.user_id));

        let stranger = Caller::user(UserId::new());
        assert!(matches!(
            notification.mark_read(&stranger),
            Err(NotificationError::NotAddressed)
        ));

        let events = notification.mark_read(&owner).unwrap();
        notification.apply_events(events);
        assert!(notification.is_read());
        assert!(notification.mark_read(&owner).unwrap().is_empty());
    }

    #[test]
    fn deleted_notification_is_gone() {
        let owner = Caller::user(UserId::new());
        let mut notification = enqueued(NotificationTarget::User(owner.user_id));
        let events = notification.delete(&owner).unwrap();
        notification.apply_events(events);

        assert!(matches!(
            notification.delete(&owner),
            Err(NotificationError::Deleted)
        ));
    }

    #[test]
    fn target_serializes_as_tagged_union() {
        let json = serde_json::to_value(NotificationTarget::Role(Role::Operation)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "role", "id": "operation"}));
    }
}
