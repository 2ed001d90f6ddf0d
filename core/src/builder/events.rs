use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle notifications broadcast by a [`crate::Builder`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// Emitted before any unit of the pass runs.
    Started { pass_id: Uuid, at: DateTime<Utc> },
    /// Emitted once the pass has settled, whatever the outcome.
    Finished {
        pass_id: Uuid,
        at: DateTime<Utc>,
        ok: bool,
        canceled: bool,
    },
}

impl BuildEvent {
    pub fn pass_id(&self) -> Uuid {
        match self {
            Self::Started { pass_id, .. } | Self::Finished { pass_id, .. } => *pass_id,
        }
    }
}
