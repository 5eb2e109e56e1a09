//! Append-only event storage with atomic multi-stream commits.
//!
//! A [`Commit`] groups the events of several aggregates together with
//! unique-key claims so that a whole business operation lands, or fails,
//! as one unit. Two backends implement [`EventStore`]: an in-memory one for
//! tests and single-node runs, and PostgreSQL.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{ACTOR, EventEnvelope, EventId, TRANSACTION_ID, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, Commit, EventStore, EventStoreExt, EventStream, StreamAppend, UniqueKey};
