use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AggregateId, Version};

/// Serialized aggregate state at a known stream version.
///
/// Loading replays only the events after `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    pub fn into_state<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stock {
        on_hand: u32,
    }

    #[test]
    fn state_survives_snapshotting() {
        let snapshot =
            Snapshot::from_state(AggregateId::new(), "Product", Version::new(50), &Stock {
                on_hand: 7,
            })
            .unwrap();

        assert_eq!(snapshot.version, Version::new(50));
        assert_eq!(snapshot.into_state::<Stock>().unwrap(), Stock { on_hand: 7 });
    }
}
