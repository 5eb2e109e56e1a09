use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// Options for the single-stream [`EventStore::append`] shortcut.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// `None` skips the version check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// A value that at most one aggregate may own at a time, e.g. the order
/// created from a given cart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueKey {
    pub namespace: String,
    pub value: String,
}

impl UniqueKey {
    pub fn new(namespace: impl Into<String>, value: impl ToString) -> Self {
        Self {
            namespace: namespace.into(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.value)
    }
}

/// New events for one stream inside a [`Commit`].
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    /// Version the writer observed. `None` skips the check.
    pub expected_version: Option<Version>,
    pub events: Vec<EventEnvelope>,
}

/// Everything one business operation writes.
///
/// Applied atomically: either every stream append, key claim, key release
/// and snapshot becomes visible, or none does. Claims are validated before
/// stream versions.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub streams: Vec<StreamAppend>,
    pub claims: Vec<(UniqueKey, AggregateId)>,
    pub releases: Vec<UniqueKey>,
    pub snapshots: Vec<Snapshot>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: StreamAppend) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn claim(mut self, key: UniqueKey, owner: AggregateId) -> Self {
        self.claims.push((key, owner));
        self
    }

    pub fn release(mut self, key: UniqueKey) -> Self {
        self.releases.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.claims.is_empty() && self.releases.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }

    /// Rejects structurally broken commits before any backend touches them.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.aggregate_id) {
                return Err(EventStoreError::InvalidCommit(format!(
                    "aggregate {} appears twice in one commit",
                    stream.aggregate_id
                )));
            }
            validate_stream(stream)?;
        }

        let mut claimed = HashSet::new();
        for (key, _) in &self.claims {
            if !claimed.insert(key) {
                return Err(EventStoreError::UniqueViolation {
                    namespace: key.namespace.clone(),
                    value: key.value.clone(),
                });
            }
        }
        Ok(())
    }
}

fn validate_stream(stream: &StreamAppend) -> Result<()> {
    let Some(first) = stream.events.first() else {
        return Err(EventStoreError::InvalidCommit(format!(
            "no events for aggregate {}",
            stream.aggregate_id
        )));
    };

    let mut expected = first.version;
    for (index, event) in stream.events.iter().enumerate() {
        if event.aggregate_id != stream.aggregate_id {
            return Err(EventStoreError::InvalidCommit(
                "all events of a stream must share its aggregate id".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidCommit(
                "all events of a stream must share one aggregate type".to_string(),
            ));
        }
        if index > 0 {
            expected = expected.next();
        }
        if event.version != expected {
            return Err(EventStoreError::InvalidCommit(format!(
                "event versions must be sequential: expected {expected}, got {}",
                event.version
            )));
        }
    }

    if let Some(observed) = stream.expected_version
        && first.version != observed.next()
    {
        return Err(EventStoreError::InvalidCommit(format!(
            "first event of {} must follow version {observed}",
            stream.aggregate_id
        )));
    }
    Ok(())
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Applies a [`Commit`] atomically.
    ///
    /// Fails with `UniqueViolation` when a claimed key is held by another
    /// aggregate and with `ConcurrencyConflict` when a stream is not at its
    /// expected version. Nothing is written on failure.
    async fn commit(&self, commit: Commit) -> Result<()>;

    /// Owner of a unique key, if claimed.
    async fn resolve_key(&self, key: &UniqueKey) -> Result<Option<AggregateId>>;

    /// Events of one stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Events whose [`EventEnvelope::sequence`] is greater than `sequence`,
    /// in commit order.
    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream>;

    /// Every event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_after(0).await
    }

    /// `None` for a stream that has never been written.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Replaces any existing snapshot of the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;

    /// Appends to a single stream. Returns the stream's new version.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let Some(first) = events.first() else {
            return Err(EventStoreError::InvalidCommit(
                "cannot append an empty event list".to_string(),
            ));
        };
        let aggregate_id = first.aggregate_id;
        let last = events.last().map(|e| e.version).unwrap_or_default();

        self.commit(Commit::new().with_stream(StreamAppend {
            aggregate_id,
            expected_version: options.expected_version,
            events,
        }))
        .await?;
        Ok(last)
    }
}

#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Latest snapshot (if any) plus the events recorded after it.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        match self.get_snapshot(aggregate_id).await? {
            Some(snapshot) => {
                let events = self
                    .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                    .await?;
                Ok((Some(snapshot), events))
            }
            None => Ok((None, self.get_events_for_aggregate(aggregate_id).await?)),
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Lets services share one store, including as `Arc<dyn EventStore>`.
#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn commit(&self, commit: Commit) -> Result<()> {
        (**self).commit(commit).await
    }

    async fn resolve_key(&self, key: &UniqueKey) -> Result<Option<AggregateId>> {
        (**self).resolve_key(key).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        (**self).get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        (**self)
            .get_events_for_aggregate_from_version(aggregate_id, from_version)
            .await
    }

    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream> {
        (**self).stream_events_after(sequence).await
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        (**self).get_aggregate_version(aggregate_id).await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        (**self).save_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        (**self).get_snapshot(aggregate_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::new(
            aggregate_id,
            "Cart",
            "LineAdded",
            Version::new(version),
            serde_json::json!({}),
        )
    }

    #[test]
    fn rejects_gaps_in_versions() {
        let id = AggregateId::new();
        let commit = Commit::new().with_stream(StreamAppend {
            aggregate_id: id,
            expected_version: None,
            events: vec![event(id, 1), event(id, 3)],
        });
        assert!(matches!(
            commit.validate(),
            Err(EventStoreError::InvalidCommit(_))
        ));
    }

    #[test]
    fn rejects_first_version_not_following_expected() {
        let id = AggregateId::new();
        let commit = Commit::new().with_stream(StreamAppend {
            aggregate_id: id,
            expected_version: Some(Version::new(4)),
            events: vec![event(id, 4)],
        });
        assert!(commit.validate().is_err());
    }

    #[test]
    fn rejects_same_stream_twice() {
        let id = AggregateId::new();
        let stream = StreamAppend {
            aggregate_id: id,
            expected_version: Some(Version::initial()),
            events: vec![event(id, 1)],
        };
        let commit = Commit::new().with_stream(stream.clone()).with_stream(stream);
        assert!(commit.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_claims_within_one_commit() {
        let key = UniqueKey::new("cart_order", "c-1");
        let commit = Commit::new()
            .claim(key.clone(), AggregateId::new())
            .claim(key, AggregateId::new());
        assert!(matches!(
            commit.validate(),
            Err(EventStoreError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn counts_events_across_streams() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let commit = Commit::new()
            .with_stream(StreamAppend {
                aggregate_id: a,
                expected_version: Some(Version::initial()),
                events: vec![event(a, 1), event(a, 2)],
            })
            .with_stream(StreamAppend {
                aggregate_id: b,
                expected_version: Some(Version::new(3)),
                events: vec![event(b, 4)],
            });
        assert!(commit.validate().is_ok());
        assert_eq!(commit.event_count(), 3);
    }
}
