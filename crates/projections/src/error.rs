//! Projection error types.

use thiserror::Error;


#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An event arrived for a stream the view has never seen created.
    #[error("Projection {projection} saw {event_type} for unknown stream {aggregate_id}")]
    UnknownStream {
        projection: &'static str,
        event_type: String,
        aggregate_id: common::AggregateId,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
