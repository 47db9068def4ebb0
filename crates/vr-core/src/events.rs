//! In-process fan-out of store changes to live subscribers.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{AnalysisWithAuthor, VoteTally};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    AnalysisCreated { analysis: Box<AnalysisWithAuthor> },
    TallyChanged { analysis_id: Uuid, community_votes: VoteTally },
}

impl LiveEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::AnalysisCreated { .. } => "analysis_created",
            LiveEvent::TallyChanged { .. } => "tally_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Dropped silently when nobody is listening.
    pub fn publish(&self, event: LiveEvent) {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!(kind, receivers, "published live event"),
            Err(_) => tracing::trace!(kind, "no live subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
