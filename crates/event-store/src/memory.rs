use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{Commit, EventStore, EventStream, UniqueKey},
};

/// Event store kept entirely in process memory.
///
/// Events are held in commit order. A commit holds the write locks on
/// events and keys for its whole duration, which gives it the same
/// all-or-nothing visibility as a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    keys: Arc<RwLock<HashMap<UniqueKey, AggregateId>>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
        self.keys.write().await.clear();
        self.snapshots.write().await.clear();
    }
}

fn current_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    events
        .iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or_default()
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, commit: Commit) -> Result<()> {
        commit.validate()?;

        let mut events = self.events.write().await;
        let mut keys = self.keys.write().await;

        for (key, _) in &commit.claims {
            if keys.contains_key(key) && !commit.releases.contains(key) {
                return Err(EventStoreError::UniqueViolation {
                    namespace: key.namespace.clone(),
                    value: key.value.clone(),
                });
            }
        }

        for stream in &commit.streams {
            let actual = current_version(&events, stream.aggregate_id);
            let first = stream.events[0].version;
            let expected = stream.expected_version.unwrap_or(actual);
            if actual != expected || first != actual.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        for key in &commit.releases {
            keys.remove(key);
        }
        for (key, owner) in commit.claims {
            keys.insert(key, owner);
        }
        for stream in commit.streams {
            for mut event in stream.events {
                event.sequence = Some(events.len() as i64 + 1);
                events.push(event);
            }
        }
        if !commit.snapshots.is_empty() {
            let mut snapshots = self.snapshots.write().await;
            for snapshot in commit.snapshots {
                snapshots.insert(snapshot.aggregate_id, snapshot);
            }
        }
        Ok(())
    }

    async fn resolve_key(&self, key: &UniqueKey) -> Result<Option<AggregateId>> {
        Ok(self.keys.read().await.get(key).copied())
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::initial())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let events = self.events.read().await;
        let mut stream: Vec<_> = events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect();
        stream.sort_by_key(|e| e.version);
        Ok(stream)
    }

    /// Sequences are `index + 1`, so the tail starts at index `sequence`.
    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream> {
        use futures_util::stream;

        let skip = usize::try_from(sequence).unwrap_or(0);
        let events: Vec<EventEnvelope> = self.events.read().await.iter().skip(skip).cloned().collect();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }
}
