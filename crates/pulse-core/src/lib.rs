pub mod aggregate;
pub mod event;
pub mod frames;
pub mod normalize;
pub mod replay;
pub mod rollup;
pub mod snapshot;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::HashMap;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::event::{Event, EventStatus};

    /// Deterministic timestamp `secs` seconds past a fixed epoch.
    pub fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    /// Minimal event for a given agent and status.
    pub fn make_event(agent_id: &str, status: EventStatus) -> Event {
        make_event_at(agent_id, status, ts(0))
    }

    /// Minimal event with an explicit receipt time.
    pub fn make_event_at(agent_id: &str, status: EventStatus, received_at: DateTime<Utc>) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            event: "heartbeat".to_string(),
            status,
            latency_ms: None,
            message: format!("{agent_id} heartbeat"),
            metadata: HashMap::new(),
            timestamp: received_at,
            received_at,
        }
    }
}
