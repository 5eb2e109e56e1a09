//! Unit of work spanning several aggregates.
//!
//! A [`Transaction`] loads aggregates, lets command methods produce events,
//! folds those events into the in-memory aggregates, and finally writes all
//! of them in one [`Commit`]. Nothing reaches the store before `commit`.
//! Notifications queued with [`Transaction::defer_delivery`] are handed
//! back only after the commit succeeded.

use std::future::Future;

use common::{AggregateId, UserId};
use event_store::{
    ACTOR, Commit, EventEnvelope, EventStore, EventStoreExt, Snapshot, StreamAppend,
    TRANSACTION_ID, UniqueKey, Version,
};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;
use crate::notification::NotificationRecord;

/// Default number of attempts for an operation that keeps losing races.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Rebuilds an aggregate from its snapshot and tail events.
///
/// Returns a default (non-existing) aggregate when the stream is empty.
pub async fn load_aggregate<A, S>(store: &S, id: AggregateId) -> Result<A, DomainError>
where
    A: Aggregate,
    S: EventStore + ?Sized,
{
    let (snapshot, events) = store.load_aggregate(id).await?;

    let mut aggregate = match snapshot {
        Some(snapshot) => {
            let version = snapshot.version;
            let mut restored: A = snapshot.into_state()?;
            restored.set_version(version);
            restored
        }
        None => A::default(),
    };

    for envelope in events {
        let event: A::Event = serde_json::from_value(envelope.payload)?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }
    Ok(aggregate)
}

/// Result of a successful commit.
#[derive(Debug, Default)]
pub struct Committed {
    pub transaction_id: Uuid,
    pub events: usize,
    /// Notifications to hand to the outbound channel, in enqueue order.
    pub outbox: Vec<NotificationRecord>,
}

pub struct Transaction<'s, S: EventStore + ?Sized> {
    store: &'s S,
    id: Uuid,
    actor: Option<UserId>,
    commit: Commit,
    outbox: Vec<NotificationRecord>,
}

impl<'s, S: EventStore + ?Sized> Transaction<'s, S> {
    pub fn begin(store: &'s S) -> Self {
        Self {
            store,
            id: Uuid::new_v4(),
            actor: None,
            commit: Commit::new(),
            outbox: Vec::new(),
        }
    }

    /// Records `actor` on every event written by this transaction.
    pub fn on_behalf_of(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Loads an aggregate for reading or staging.
    ///
    /// Each aggregate is loaded at most once per transaction once it has
    /// been staged; a second load would miss the staged events.
    pub async fn load<A: Aggregate>(&self, id: AggregateId) -> Result<A, DomainError> {
        if self.is_staged(id) {
            return Err(DomainError::Internal(format!(
                "{} {id} reloaded after staging",
                A::aggregate_type()
            )));
        }
        load_aggregate(self.store, id).await
    }

    /// Like [`Transaction::load`] but fails with `NotFound` for an empty stream.
    pub async fn load_existing<A: Aggregate>(
        &self,
        id: AggregateId,
        entity: &'static str,
    ) -> Result<A, DomainError> {
        let aggregate: A = self.load(id).await?;
        if aggregate.exists() {
            Ok(aggregate)
        } else {
            Err(DomainError::not_found(entity, id))
        }
    }

    /// Owner of a unique key as of the last commit.
    pub async fn resolve(&self, key: &UniqueKey) -> Result<Option<AggregateId>, DomainError> {
        Ok(self.store.resolve_key(key).await?)
    }

    /// Applies `events` to `aggregate` and records them for the commit.
    ///
    /// The stream's expected version is the version the aggregate had when
    /// it was first staged in this transaction.
    pub fn stage<A: Aggregate>(
        &mut self,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let observed = aggregate.version();
        let mut version = observed;
        let mut pending = Vec::with_capacity(events.len());
        for event in events {
            version = version.next();
            pending.push((event.event_type(), serde_json::to_value(&event)?, version));
            aggregate.apply(event);
            aggregate.set_version(version);
        }

        let aggregate_id = aggregate.id().ok_or_else(|| {
            DomainError::Internal(format!(
                "{} events staged before creation",
                A::aggregate_type()
            ))
        })?;

        let envelopes = pending
            .into_iter()
            .map(|(event_type, payload, version)| {
                self.envelope(aggregate_id, A::aggregate_type(), event_type, version, payload)
            })
            .collect::<Vec<_>>();

        match self
            .commit
            .streams
            .iter_mut()
            .find(|s| s.aggregate_id == aggregate_id)
        {
            Some(stream) => stream.events.extend(envelopes),
            None => self.commit.streams.push(StreamAppend {
                aggregate_id,
                expected_version: Some(observed),
                events: envelopes,
            }),
        }
        Ok(())
    }

    /// Stages events and, when a snapshot boundary is crossed, writes the
    /// aggregate's state in the same commit.
    pub fn stage_with_snapshot<A: SnapshotCapable>(
        &mut self,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        let previous = aggregate.version();
        self.stage(aggregate, events)?;

        if let Some(id) = aggregate.id()
            && aggregate.snapshot_due_since(previous)
        {
            self.commit.snapshots.push(Snapshot::from_state(
                id,
                A::aggregate_type(),
                aggregate.version(),
                &*aggregate,
            )?);
        }
        Ok(())
    }

    pub fn claim(&mut self, key: UniqueKey, owner: impl Into<AggregateId>) {
        self.commit.claims.push((key, owner.into()));
    }

    pub fn release(&mut self, key: UniqueKey) {
        self.commit.releases.push(key);
    }

    /// Queues a notification for outbound delivery once the commit succeeds.
    pub fn defer_delivery(&mut self, record: NotificationRecord) {
        self.outbox.push(record);
    }

    pub async fn commit(self) -> Result<Committed, DomainError> {
        let events = self.commit.event_count();
        if !self.commit.is_empty() {
            self.store.commit(self.commit).await?;
            metrics::counter!("events_committed_total").increment(events as u64);
        }
        tracing::debug!(transaction_id = %self.id, events, "transaction committed");

        Ok(Committed {
            transaction_id: self.id,
            events,
            outbox: self.outbox,
        })
    }

    fn is_staged(&self, id: AggregateId) -> bool {
        self.commit.streams.iter().any(|s| s.aggregate_id == id)
    }

    fn envelope(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        event_type: &str,
        version: Version,
        payload: serde_json::Value,
    ) -> EventEnvelope {
        let envelope = EventEnvelope::new(aggregate_id, aggregate_type, event_type, version, payload)
            .with_metadata(TRANSACTION_ID, serde_json::json!(self.id.to_string()));
        match self.actor {
            Some(actor) => envelope.with_metadata(ACTOR, serde_json::json!(actor.to_string())),
            None => envelope,
        }
    }
}

/// Runs `attempt` until it succeeds, fails for a reason other than a lost
/// optimistic race, or `max_attempts` is reached.
///
/// `attempt` must start a fresh [`Transaction`] on every call.
pub async fn retry_on_conflict<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && tries < max_attempts => {
                tracing::debug!(operation, attempt = tries, error = %err, "retrying after conflict");
                metrics::counter!("transaction_retries_total", "operation" => operation)
                    .increment(1);
                tries += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use common::ProductId;
    use event_store::{EventStoreError, InMemoryEventStore};

    use super::*;
    use crate::inventory::{ListProduct, Product};
    use crate::money::Money;

    fn listing(stock: u32) -> ListProduct {
        ListProduct {
            name: "Lamp".into(),
            organization_id: None,
            price: Money::from_units(10),
            purchase_price: Money::from_units(6),
            stock_qty: stock,
        }
    }

    async fn listed(store: &InMemoryEventStore, stock: u32) -> ProductId {
        let id = ProductId::new();
        let mut tx = Transaction::begin(store);
        let mut product = Product::default();
        let events = product.list(id, listing(stock)).unwrap();
        tx.stage(&mut product, events).unwrap();
        tx.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn staged_events_are_invisible_until_commit() {
        let store = InMemoryEventStore::new();
        let id = ProductId::new();

        let mut tx = Transaction::begin(&store);
        let mut product = Product::default();
        let events = product.list(id, listing(3)).unwrap();
        tx.stage(&mut product, events).unwrap();
        assert_eq!(product.version(), Version::first());
        assert_eq!(store.event_count().await, 0);

        let committed = tx.commit().await.unwrap();
        assert_eq!(committed.events, 1);

        let envelopes = store.get_events_for_aggregate(id.into()).await.unwrap();
        assert_eq!(envelopes[0].transaction_id(), Some(committed.transaction_id));
    }

    #[tokio::test]
    async fn dropped_transaction_writes_nothing() {
        let store = InMemoryEventStore::new();
        let id = listed(&store, 3).await;

        {
            let mut tx = Transaction::begin(&store);
            let mut product: Product = tx.load(id.into()).await.unwrap();
            let events = product.reserve(2, None).unwrap();
            tx.stage(&mut product, events).unwrap();
        }

        let product: Product = load_aggregate(&store, id.into()).await.unwrap();
        assert_eq!(product.stock_qty(), 3);
    }

    #[tokio::test]
    async fn staging_twice_continues_the_same_stream() {
        let store = InMemoryEventStore::new();
        let id = listed(&store, 5).await;

        let mut tx = Transaction::begin(&store);
        let mut product: Product = tx.load(id.into()).await.unwrap();
        let first = product.reserve(1, None).unwrap();
        tx.stage(&mut product, first).unwrap();
        let second = product.reserve(1, None).unwrap();
        tx.stage(&mut product, second).unwrap();
        tx.commit().await.unwrap();

        let product: Product = load_aggregate(&store, id.into()).await.unwrap();
        assert_eq!(product.stock_qty(), 3);
        assert_eq!(product.version(), Version::new(3));
    }

    #[tokio::test]
    async fn reloading_a_staged_aggregate_is_refused() {
        let store = InMemoryEventStore::new();
        let id = listed(&store, 5).await;

        let mut tx = Transaction::begin(&store);
        let mut product: Product = tx.load(id.into()).await.unwrap();
        let events = product.reserve(1, None).unwrap();
        tx.stage(&mut product, events).unwrap();

        assert!(tx.load::<Product>(id.into()).await.is_err());
    }

    #[tokio::test]
    async fn load_existing_reports_missing_streams() {
        let store = InMemoryEventStore::new();
        let tx = Transaction::begin(&store);
        let err = tx
            .load_existing::<Product>(AggregateId::new(), "Product")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn retry_reruns_lost_races_only() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, DomainError> = retry_on_conflict("test", 3, move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(DomainError::from(EventStoreError::ConcurrencyConflict {
                    aggregate_id: AggregateId::new(),
                    expected: Version::first(),
                    actual: Version::new(2),
                }))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), DomainError> = retry_on_conflict("test", 3, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::Forbidden("no".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), DomainError> = retry_on_conflict("test", 2, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::from(EventStoreError::ConcurrencyConflict {
                aggregate_id: AggregateId::new(),
                expected: Version::first(),
                actual: Version::new(2),
            }))
        })
        .await;
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
