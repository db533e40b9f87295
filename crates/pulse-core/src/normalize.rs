use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::event::{Event, EventStatus};

/// Agent id assigned when a payload carries none.
pub const DEFAULT_AGENT_ID: &str = "unknown-agent";
/// Event kind assigned when a payload carries none.
pub const DEFAULT_EVENT_KIND: &str = "heartbeat";

/// Issues `receivedAt` stamps that never move backwards within a process
/// lifetime, even if the wall clock does.
#[derive(Debug, Default)]
pub struct ReceiptClock {
    last: Option<DateTime<Utc>>,
}

impl ReceiptClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next receipt stamp from the wall clock.
    pub fn stamp(&mut self) -> DateTime<Utc> {
        self.stamp_at(Utc::now())
    }

    /// Next receipt stamp, clamped to be >= every previously issued stamp.
    pub fn stamp_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stamped = match self.last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last = Some(stamped);
        stamped
    }
}

/// Convert a loosely-typed submission into the fixed [`Event`] shape.
///
/// This is the one normalization boundary: every field has a defined
/// fallback, so any JSON value (object or not) produces a valid event.
pub fn normalize_event(payload: &Value, received_at: DateTime<Utc>) -> Event {
    let metadata: HashMap<String, Value> = match payload.get("metadata") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => HashMap::new(),
    };

    Event {
        id: uuid::Uuid::new_v4().to_string(),
        agent_id: lossy_string(payload.get("agentId"))
            .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string()),
        event: lossy_string(payload.get("event"))
            .unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string()),
        status: payload
            .get("status")
            .and_then(Value::as_str)
            .map(EventStatus::parse_lossy)
            .unwrap_or_default(),
        latency_ms: latency(payload.get("latencyMs")),
        message: lossy_string(payload.get("message")).unwrap_or_default(),
        metadata,
        timestamp: parse_timestamp(payload.get("timestamp"), received_at),
        received_at,
    }
}

/// String coercion with loose-input semantics: empty strings count as
/// absent, numbers are stringified, everything else is absent.
fn lossy_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Latency must come out as a finite, non-negative number or null.
fn latency(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn parse_timestamp(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}
