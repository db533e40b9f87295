use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source label used for per-source rollups when a payload carries none.
pub const DEFAULT_SOURCE: &str = "manual";

/// Status classes an event can carry after normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Ok,
    Warning,
    Error,
}

impl EventStatus {
    /// Parse a loosely-typed status string; anything unrecognized is `Ok`.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Ok,
        }
    }

    /// Whether events with this status raise an alert.
    pub fn is_alerting(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// One normalized activity record ingested into the store.
///
/// Events are immutable once constructed; the only way to build one from
/// untrusted input is [`crate::normalize::normalize_event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub agent_id: String,
    pub event: String,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// Rollup key for per-source counters: `metadata.source` or "manual".
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
    }

    /// Token count contributed by this event (`metadata.tokenUsage.totalTokens`).
    pub fn token_delta(&self) -> u64 {
        self.metadata
            .get("tokenUsage")
            .and_then(|usage| usage.get("totalTokens"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
    }
}

/// A warning or error surfaced from an event, kept in a bounded ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub severity: EventStatus,
    pub agent_id: String,
    pub event: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Build the alert for a warning/error event; `None` for ok events.
    pub fn from_event(evt: &Event) -> Option<Self> {
        if !evt.status.is_alerting() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            severity: evt.status,
            agent_id: evt.agent_id.clone(),
            event: evt.event.clone(),
            message: if evt.message.is_empty() {
                "No message".to_string()
            } else {
                evt.message.clone()
            },
            created_at: evt.received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_event, ts};

    #[test]
    fn status_json_values() {
        assert_eq!(serde_json::to_string(&EventStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(
            serde_json::to_string(&EventStatus::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(
            serde_json::to_string(&EventStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn status_parse_lossy() {
        assert_eq!(EventStatus::parse_lossy("error"), EventStatus::Error);
        assert_eq!(EventStatus::parse_lossy("WARNING"), EventStatus::Warning);
        assert_eq!(EventStatus::parse_lossy("ok"), EventStatus::Ok);
        assert_eq!(EventStatus::parse_lossy("fatal"), EventStatus::Ok);
        assert_eq!(EventStatus::parse_lossy(""), EventStatus::Ok);
    }

    #[test]
    fn event_json_roundtrip() {
        let event = make_event("builder", EventStatus::Warning);
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn event_wire_fields_are_camel_case() {
        let event = make_event("builder", EventStatus::Ok);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("agentId").is_some());
        assert!(json.get("latencyMs").is_some());
        assert!(json.get("receivedAt").is_some());
        assert!(json.get("agent_id").is_none());
    }

    #[test]
    fn event_missing_optional_fields() {
        let json = r#"{
            "id": "evt-1",
            "agentId": "lead",
            "event": "heartbeat",
            "timestamp": "2026-01-01T00:00:00Z",
            "receivedAt": "2026-01-01T00:00:00Z"
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.status, EventStatus::Ok);
        assert!(event.latency_ms.is_none());
        assert!(event.message.is_empty());
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn source_defaults_to_manual() {
        let mut event = make_event("lead", EventStatus::Ok);
        event.metadata.clear();
        assert_eq!(event.source(), "manual");

        event
            .metadata
            .insert("source".to_string(), serde_json::json!(""));
        assert_eq!(event.source(), "manual");

        event
            .metadata
            .insert("source".to_string(), serde_json::json!("claude_session"));
        assert_eq!(event.source(), "claude_session");
    }

    #[test]
    fn token_delta_reads_nested_usage() {
        let mut event = make_event("lead", EventStatus::Ok);
        assert_eq!(event.token_delta(), 0);

        event.metadata.insert(
            "tokenUsage".to_string(),
            serde_json::json!({ "inputTokens": 10, "outputTokens": 32, "totalTokens": 42 }),
        );
        assert_eq!(event.token_delta(), 42);
    }

    #[test]
    fn alert_only_for_warning_or_error() {
        let ok = make_event("lead", EventStatus::Ok);
        assert!(Alert::from_event(&ok).is_none());

        let warn = make_event("lead", EventStatus::Warning);
        let alert = Alert::from_event(&warn).unwrap();
        assert_eq!(alert.severity, EventStatus::Warning);
        assert_eq!(alert.agent_id, "lead");
        assert_eq!(alert.created_at, warn.received_at);
    }

    #[test]
    fn alert_message_falls_back() {
        let mut event = make_event("lead", EventStatus::Error);
        event.message = String::new();
        let alert = Alert::from_event(&event).unwrap();
        assert_eq!(alert.message, "No message");
    }

    #[test]
    fn alert_created_at_matches_receipt() {
        let mut event = make_event("lead", EventStatus::Error);
        event.received_at = ts(77);
        let alert = Alert::from_event(&event).unwrap();
        assert_eq!(alert.created_at, ts(77));
    }
}
