//! Query side of the commerce core.
//!
//! Every view implements [`Projection`] and is fed by a
//! [`ProjectionProcessor`] walking the store in commit order:
//! - [`OrderBoardView`] lists orders with their payment status
//! - [`NotificationInboxView`] resolves notifications per caller
//! - [`InquiryBoardView`] lists inquiries with role-scoped redaction

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    InboxEntry, InquiryBoardView, NotificationInboxView, OrderBoardView, OrderSummary,
};
