//! Notifications addressed to a user or to a whole role-class.
//!
//! Creating the record is part of the triggering transaction; handing it
//! to an outbound channel happens after the commit and is best effort.

mod aggregate;
mod delivery;
mod events;
mod service;

pub use aggregate::{Notification, NotificationRecord, NotificationTarget, Severity, enqueue};
pub use delivery::{
    DeliveryChannel, DeliveryError, DeliveryReport, InMemoryDeliveryChannel, InMemoryDirectory,
    OutboundDispatcher, RecipientDirectory,
};
pub use events::{NotificationDeletedData, NotificationEvent, NotificationReadData};
pub use service::NotificationService;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification already exists")]
    AlreadyEnqueued,

    #[error("Notification is not addressed to the caller")]
    NotAddressed,

    #[error("Notification has been deleted")]
    Deleted,

    #[error("Notification title cannot be empty")]
    EmptyTitle,
}

impl NotificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotificationError::AlreadyEnqueued => ErrorKind::Conflict,
            NotificationError::NotAddressed => ErrorKind::Forbidden,
            NotificationError::Deleted => ErrorKind::NotFound,
            NotificationError::EmptyTitle => ErrorKind::InvalidInput,
        }
    }
}
