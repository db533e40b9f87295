use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::snapshot::Snapshot;

/// Messages delivered on the live stream: exactly one snapshot when a viewer
/// connects, then one frame per accepted event. Keepalive comments ride the
/// transport and never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum StreamFrame {
    Snapshot(Box<Snapshot>),
    Event(Box<Event>),
}

impl StreamFrame {
    pub fn snapshot(snapshot: Snapshot) -> Self {
        Self::Snapshot(Box::new(snapshot))
    }

    pub fn event(event: Event) -> Self {
        Self::Event(Box::new(event))
    }
}
