//! Feeds committed events to projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// How far the processor has walked the store.
#[derive(Debug, Default, Clone, Copy)]
struct Checkpoint {
    /// Events seen, in commit order.
    events: u64,
    /// Store sequence of the last event seen.
    sequence: i64,
}

/// Delivers events from the store to registered projections.
///
/// Catch-up resumes from the last sequence it saw and hands each projection
/// the events past its position. Catch-ups are serialized so no event is
/// delivered twice to the same projection.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    checkpoint: Mutex<Checkpoint>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            checkpoint: Mutex::new(Checkpoint::default()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the end of the store. Returns the
    /// number of events seen since the store was empty.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut checkpoint = self.checkpoint.lock().await;

        // A projection behind the checkpoint was reset or registered late.
        for projection in &self.projections {
            if projection.position().await.events_processed < checkpoint.events {
                *checkpoint = Checkpoint::default();
                break;
            }
        }

        let mut stream = self.store.stream_events_after(checkpoint.sequence).await?;
        let mut event_index = checkpoint.events;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;

            for projection in &self.projections {
                let pos = projection.position().await;
                if pos.events_processed < event_index {
                    projection.handle(&event).await?;
                    delivered += 1;
                }
            }

            if let Some(sequence) = event.sequence {
                *checkpoint = Checkpoint {
                    events: event_index,
                    sequence,
                };
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
            tracing::debug!(events = event_index, delivered, "catch-up complete");
        }
        Ok(event_index)
    }

    /// Resets every projection and replays the whole store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
