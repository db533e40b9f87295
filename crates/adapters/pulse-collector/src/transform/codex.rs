use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Value, json};

use pulse_core::event::EventStatus;

use super::{EventPayload, LEAD_AGENT, MESSAGE_LIMIT, synthetic_to_event, truncate_chars};

pub const HISTORY_SOURCE: &str = "codex_history";
pub const LOG_SOURCE: &str = "codex_log";

/// Tool-call arguments kept in metadata are cut to this many characters.
const ARGS_LIMIT: usize = 180;

static LOG_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}T\S+)").expect("valid timestamp pattern"));
static TOOL_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ToolCall:\s+(\S+)\s+(\{.*\})").expect("valid tool-call pattern"));

/// One line of the Codex prompt history file → at most one event.
pub fn history_line_to_events(line: &str) -> Vec<EventPayload> {
    let Ok(parsed) = serde_json::from_str::<Value>(line) else {
        return Vec::new();
    };
    if let Some(warning) = synthetic_to_event(&parsed, HISTORY_SOURCE) {
        return vec![warning];
    }

    let Some(text) = parsed.get("text").and_then(Value::as_str) else {
        return Vec::new();
    };
    if text.is_empty() {
        return Vec::new();
    }

    vec![EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "user_request".to_string(),
        status: EventStatus::Ok,
        message: Some(truncate_chars(text, MESSAGE_LIMIT)),
        timestamp: parsed.get("ts").and_then(iso_from_unix_seconds),
        metadata: json!({
            "source": HISTORY_SOURCE,
            "sessionId": parsed.get("session_id").cloned().unwrap_or(Value::Null),
            "textLength": text.chars().count(),
        }),
    }]
}

/// One line of the Codex TUI log → at most one event, keyed off the log
/// markers the TUI emits. Anything else yields nothing.
pub fn log_line_to_events(line: &str) -> Vec<EventPayload> {
    if let Ok(parsed) = serde_json::from_str::<Value>(line)
        && let Some(warning) = synthetic_to_event(&parsed, LOG_SOURCE)
    {
        return vec![warning];
    }

    if line.contains("task_started") {
        return vec![log_event("task_started", EventStatus::Ok, "Codex task started", line)];
    }
    if line.contains("task_complete") {
        return vec![log_event(
            "task_complete",
            EventStatus::Ok,
            "Codex task completed",
            line,
        )];
    }

    if let Some(caps) = TOOL_CALL.captures(line) {
        let tool = caps.get(1).map_or("unknown_tool", |m| m.as_str());
        let raw_args = caps.get(2).map_or("", |m| m.as_str());
        // Re-serialize when the args parse, keep them verbatim otherwise.
        let args = match serde_json::from_str::<Value>(raw_args) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => raw_args.to_string(),
        };
        return vec![EventPayload {
            agent_id: LEAD_AGENT.to_string(),
            event: "tool_call".to_string(),
            status: EventStatus::Ok,
            message: Some(tool.to_string()),
            timestamp: parse_log_timestamp(line),
            metadata: json!({
                "source": LOG_SOURCE,
                "args": truncate_chars(&args, ARGS_LIMIT),
            }),
        }];
    }

    if line.contains("needs_follow_up=true") {
        return vec![log_event(
            "follow_up_required",
            EventStatus::Warning,
            "needs_follow_up=true",
            line,
        )];
    }

    if line.contains(" ERROR ") || line.contains("error=") {
        return vec![log_event(
            "runtime_error",
            EventStatus::Error,
            &truncate_chars(line, MESSAGE_LIMIT),
            line,
        )];
    }

    Vec::new()
}

fn log_event(event: &str, status: EventStatus, message: &str, line: &str) -> EventPayload {
    EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: event.to_string(),
        status,
        message: Some(message.to_string()),
        timestamp: parse_log_timestamp(line),
        metadata: json!({ "source": LOG_SOURCE }),
    }
}

/// Leading RFC3339 timestamp of a log line; `None` means the receipt time
/// stands in downstream.
fn parse_log_timestamp(line: &str) -> Option<String> {
    let raw = LOG_TIMESTAMP.captures(line)?.get(1)?.as_str();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
}

fn iso_from_unix_seconds(value: &Value) -> Option<String> {
    let secs = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    Utc.timestamp_opt(secs, 0).single().map(|dt| dt.to_rfc3339())
}
