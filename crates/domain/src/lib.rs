//! Commerce domain: event-sourced aggregates, the unit of work that
//! commits them together, and the error taxonomy every operation reports.

pub mod aggregate;
pub mod cart;
pub mod error;
pub mod inquiry;
pub mod inventory;
pub mod keys;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment;
pub mod transaction;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use error::{DomainError, ErrorKind};
pub use money::Money;
pub use transaction::{
    Committed, DEFAULT_MAX_ATTEMPTS, Transaction, load_aggregate, retry_on_conflict,
};
