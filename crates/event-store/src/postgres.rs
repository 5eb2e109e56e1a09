use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Snapshot, Version,
    store::{Commit, EventStore, EventStream, StreamAppend, UniqueKey},
};

/// Advisory lock key held while a commit inserts events.
const EVENT_APPEND_LOCK: i64 = 0x6576_656e_7473;

/// PostgreSQL-backed event store. One [`Commit`] is one SQL transaction.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(PgPool::connect(database_url).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Writes a validated commit in one SQL transaction.
    ///
    /// Keys and streams are written in sorted order so two commits touching
    /// the same rows lock them in the same order. Events are inserted under
    /// a transaction-scoped advisory lock, which makes `sequence` order equal
    /// commit order.
    async fn apply(&self, commit: &Commit) -> Result<()> {
        let mut releases: Vec<&UniqueKey> = commit.releases.iter().collect();
        releases.sort();
        let mut claims: Vec<&(UniqueKey, AggregateId)> = commit.claims.iter().collect();
        claims.sort_by(|a, b| a.0.cmp(&b.0));
        let mut streams: Vec<&StreamAppend> = commit.streams.iter().collect();
        streams.sort_by_key(|s| s.aggregate_id);
        let mut snapshots: Vec<&Snapshot> = commit.snapshots.iter().collect();
        snapshots.sort_by_key(|s| s.aggregate_id);

        let mut tx = self.pool.begin().await?;

        for key in releases {
            sqlx::query("DELETE FROM unique_keys WHERE namespace = $1 AND value = $2")
                .bind(&key.namespace)
                .bind(&key.value)
                .execute(&mut *tx)
                .await?;
        }
        for (key, owner) in claims {
            Self::claim_key(&mut tx, key, *owner).await?;
        }
        if !streams.is_empty() {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(EVENT_APPEND_LOCK)
                .execute(&mut *tx)
                .await?;
        }
        for stream in streams {
            Self::append_stream(&mut tx, stream).await?;
        }
        for snapshot in snapshots {
            upsert_snapshot(&mut tx, snapshot).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.try_get("metadata")?)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            sequence: Some(row.try_get("sequence")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn claim_key(
        tx: &mut Transaction<'_, Postgres>,
        key: &UniqueKey,
        owner: AggregateId,
    ) -> Result<()> {
        sqlx::query("INSERT INTO unique_keys (namespace, value, aggregate_id) VALUES ($1, $2, $3)")
            .bind(&key.namespace)
            .bind(&key.value)
            .bind(owner.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_keys_pkey")
                {
                    return EventStoreError::UniqueViolation {
                        namespace: key.namespace.clone(),
                        value: key.value.clone(),
                    };
                }
                EventStoreError::Database(e)
            })?;
        Ok(())
    }

    async fn append_stream(
        tx: &mut Transaction<'_, Postgres>,
        stream: &StreamAppend,
    ) -> Result<()> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(stream.aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if let Some(expected) = stream.expected_version
            && actual != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: stream.aggregate_id,
                expected,
                actual,
            });
        }

        for event in &stream.events {
            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(serde_json::to_value(&event.metadata)?)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                // A concurrent writer inserted the same version first.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id: stream.aggregate_id,
                        expected: stream.expected_version.unwrap_or(actual),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn commit(&self, commit: Commit) -> Result<()> {
        commit.validate()?;
        self.apply(&commit).await.map_err(contention)?;
        tracing::debug!(
            streams = commit.streams.len(),
            events = commit.event_count(),
            "commit applied"
        );
        Ok(())
    }

    async fn resolve_key(&self, key: &UniqueKey) -> Result<Option<AggregateId>> {
        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT aggregate_id FROM unique_keys WHERE namespace = $1 AND value = $2",
        )
        .bind(&key.namespace)
        .bind(&key.value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner.map(AggregateId::from_uuid))
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
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_after(&self, sequence: i64) -> Result<EventStream> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE sequence > $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(sequence)
        .fetch_all(&self.pool)
        .await?;

        // Rows are materialized so the stream does not borrow the pool.
        let events: Vec<Result<EventEnvelope>> = rows.into_iter().map(Self::row_to_event).collect();
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(version.map(Version::new))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_snapshot(&mut tx, &snapshot).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT aggregate_id, aggregate_type, version, timestamp, state FROM snapshots WHERE aggregate_id = $1",
        )
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                state: row.try_get("state")?,
            })),
            None => Ok(None),
        }
    }
}

async fn upsert_snapshot(tx: &mut Transaction<'_, Postgres>, snapshot: &Snapshot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO snapshots (aggregate_id, aggregate_type, version, timestamp, state)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (aggregate_id) DO UPDATE SET
            aggregate_type = EXCLUDED.aggregate_type,
            version = EXCLUDED.version,
            timestamp = EXCLUDED.timestamp,
            state = EXCLUDED.state
        "#,
    )
    .bind(snapshot.aggregate_id.as_uuid())
    .bind(&snapshot.aggregate_type)
    .bind(snapshot.version.as_i64())
    .bind(snapshot.timestamp)
    .bind(&snapshot.state)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Deadlocks and serialization failures abort the whole transaction, so
/// nothing was written and the operation may be re-run.
fn contention(err: EventStoreError) -> EventStoreError {
    if let EventStoreError::Database(sqlx::Error::Database(ref db_err)) = err
        && matches!(db_err.code().as_deref(), Some("40P01" | "40001"))
    {
        return EventStoreError::WriteConflict(db_err.message().to_string());
    }
    err
}
