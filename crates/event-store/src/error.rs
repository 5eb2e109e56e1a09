use thiserror::Error;

use crate::{AggregateId, Version};

#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream moved on since the writer loaded it.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A unique key claimed by the commit is already held.
    #[error("Unique key {namespace}/{value} is already claimed")]
    UniqueViolation { namespace: String, value: String },

    /// The database aborted the commit (deadlock or serialization
    /// failure). Nothing was written.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// The commit itself is malformed (empty stream, gaps in versions, ...).
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Whether re-running the operation against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::ConcurrencyConflict { .. } | EventStoreError::WriteConflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EventStoreError>;
