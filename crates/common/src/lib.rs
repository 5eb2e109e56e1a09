//! Identifiers and caller identity shared by every crate in the workspace.

pub mod identity;
pub mod ids;
pub mod types;

pub use identity::{Caller, CallerProfile, OperatorId, OrganizationId, Role, UnknownRole};
pub use ids::{
    CartId, InquiryId, NotificationId, OrderId, PaymentId, ProductId, ReplyId, UserId,
};
pub use types::AggregateId;
