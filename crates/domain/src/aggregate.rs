//! Event-sourced aggregate contract.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on an aggregate's stream. Named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// State rebuilt by folding its own events.
///
/// Command methods on an aggregate take `&self`, check invariants, and
/// return the events to record. [`Aggregate::apply`] folds one event into
/// the state and never fails: the event already happened.
pub trait Aggregate: Default + Serialize + DeserializeOwned + Send + Sync + Sized {
    type Event: DomainEvent;
    type Error: std::error::Error + Send + Sync;

    fn aggregate_type() -> &'static str;

    /// `None` until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    fn exists(&self) -> bool {
        self.id().is_some()
    }
}

/// Aggregates whose full state is periodically stored next to the stream.
pub trait SnapshotCapable: Aggregate {
    fn snapshot_interval() -> i64 {
        100
    }

    /// Whether moving from `previous` to the current version crossed a
    /// snapshot boundary.
    fn snapshot_due_since(&self, previous: Version) -> bool {
        let interval = Self::snapshot_interval();
        interval > 0 && previous.as_i64() / interval != self.version().as_i64() / interval
    }
}
