pub mod claude;
pub mod codex;

use serde::Serialize;
use serde_json::{Value, json};

use pulse_core::event::EventStatus;

/// Agent id stamped on events derived from agent-process logs.
pub const LEAD_AGENT: &str = "lead";
/// Free-text message fields are cut to this many characters.
pub const MESSAGE_LIMIT: usize = 120;
/// Serialized tool-call inputs larger than this are redacted.
pub const TOOL_INPUT_LIMIT: usize = 512;

/// A loosely-typed event submission, the shape the monitor's ingestion
/// endpoint normalizes. Transformers produce these; the submitter posts
/// them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub agent_id: String,
    pub event: String,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub metadata: Value,
}

/// Character-bounded copy of a free-text field.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Event reported when a tailed file cannot be read.
pub fn collector_error(detail: &str) -> EventPayload {
    EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "collector_error".to_string(),
        status: EventStatus::Error,
        message: Some(truncate_chars(detail, MESSAGE_LIMIT)),
        timestamp: None,
        metadata: json!({ "source": "collector" }),
    }
}

/// Recognize the tailer's synthetic gap marker and surface it as a warning
/// event carrying the given source label.
pub(crate) fn synthetic_to_event(parsed: &Value, source: &str) -> Option<EventPayload> {
    if !parsed
        .get("synthetic")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return None;
    }
    Some(EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "collector_warning".to_string(),
        status: EventStatus::Warning,
        message: parsed
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp: None,
        metadata: json!({
            "source": source,
            "kind": parsed.get("kind").cloned().unwrap_or(Value::Null),
        }),
    })
}
