use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::NotificationRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    NotificationEnqueued(NotificationRecord),
    NotificationRead(NotificationReadData),
    NotificationDeleted(NotificationDeletedData),
}

impl DomainEvent for NotificationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::NotificationEnqueued(_) => "NotificationEnqueued",
            NotificationEvent::NotificationRead(_) => "NotificationRead",
            NotificationEvent::NotificationDeleted(_) => "NotificationDeleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReadData {
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDeletedData {
    pub deleted_at: DateTime<Utc>,
}
