use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// Metadata key shared by every event written in one commit.
pub const TRANSACTION_ID: &str = "transaction_id";
/// Metadata key naming the user that caused the event.
pub const ACTOR: &str = "actor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event inside its stream.
///
/// A stream with no events is at version 0; the first event is version 1.
/// Optimistic concurrency compares the version a writer observed with the
/// version the store holds at commit time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that has never been written.
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A stored event: the serialized domain event plus the data needed to
/// order, route and audit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    /// Variant name of the domain event, e.g. `StockReserved`.
    pub event_type: String,
    pub aggregate_id: AggregateId,
    /// Stream family, e.g. `Product` or `Inquiry`.
    pub aggregate_type: String,
    pub version: Version,
    /// Global commit position, assigned by the store. `None` until stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        version: Version,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            sequence: None,
            timestamp: Utc::now(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Serializes `payload` into a new envelope.
    pub fn from_payload<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        version: Version,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            event_type,
            version,
            serde_json::to_value(payload)?,
        ))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Id of the commit that wrote this event, when recorded.
    pub fn transaction_id(&self) -> Option<Uuid> {
        self.metadata
            .get(TRANSACTION_ID)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn actor(&self) -> Option<&str> {
        self.metadata.get(ACTOR).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_start_at_zero_and_step_by_one() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::new(2) > Version::first());
    }

    #[test]
    fn envelope_reads_transaction_metadata() {
        let tx = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            AggregateId::new(),
            "Product",
            "StockReserved",
            Version::first(),
            serde_json::json!({"quantity": 2}),
        )
        .with_metadata(TRANSACTION_ID, serde_json::json!(tx.to_string()))
        .with_metadata(ACTOR, serde_json::json!("user-1"));

        assert_eq!(envelope.transaction_id(), Some(tx));
        assert_eq!(envelope.actor(), Some("user-1"));
    }

    #[test]
    fn envelope_without_metadata_has_no_transaction() {
        let envelope = EventEnvelope::new(
            AggregateId::new(),
            "Cart",
            "CartOpened",
            Version::first(),
            serde_json::Value::Null,
        );
        assert!(envelope.transaction_id().is_none());
        assert!(envelope.actor().is_none());
    }
}
