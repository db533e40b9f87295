use serde_json::{Value, json};

use pulse_core::event::EventStatus;

use super::{EventPayload, LEAD_AGENT, MESSAGE_LIMIT, TOOL_INPUT_LIMIT, synthetic_to_event, truncate_chars};

pub const HISTORY_SOURCE: &str = "claude_history";
pub const SESSION_SOURCE: &str = "claude_session";

/// One line of the Claude prompt history file → at most one event.
/// Unrecognized or unparsable lines yield nothing.
pub fn history_line_to_events(line: &str) -> Vec<EventPayload> {
    let Ok(parsed) = serde_json::from_str::<Value>(line) else {
        return Vec::new();
    };
    if let Some(warning) = synthetic_to_event(&parsed, HISTORY_SOURCE) {
        return vec![warning];
    }

    let Some(display) = parsed.get("display").and_then(Value::as_str) else {
        return Vec::new();
    };
    if display.is_empty() {
        return Vec::new();
    }

    vec![EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "user_request".to_string(),
        status: EventStatus::Ok,
        message: Some(truncate_chars(display, MESSAGE_LIMIT)),
        timestamp: parsed
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string),
        metadata: json!({
            "source": HISTORY_SOURCE,
            "sessionId": parsed.get("sessionId").cloned().unwrap_or(Value::Null),
            "textLength": display.chars().count(),
        }),
    }]
}

/// One line of a Claude session transcript → zero or more events: user
/// messages, assistant messages, tool calls, and token usage.
pub fn session_line_to_events(line: &str) -> Vec<EventPayload> {
    let Ok(parsed) = serde_json::from_str::<Value>(line) else {
        return Vec::new();
    };
    if let Some(warning) = synthetic_to_event(&parsed, SESSION_SOURCE) {
        return vec![warning];
    }

    let session_id = parsed
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or("");
    let timestamp = parsed
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string);

    match parsed.get("type").and_then(Value::as_str).unwrap_or("") {
        "user" => user_events(&parsed, session_id, timestamp),
        "assistant" => assistant_events(&parsed, session_id, timestamp),
        _ => Vec::new(),
    }
}

fn user_events(parsed: &Value, session_id: &str, timestamp: Option<String>) -> Vec<EventPayload> {
    let raw = parsed.get("message").and_then(|m| m.get("content"));
    let content = match raw {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                item.get("text")
                    .or_else(|| item.get("content"))
                    .and_then(Value::as_str)
            })
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => return Vec::new(),
    };
    if content.is_empty() {
        return Vec::new();
    }

    vec![EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "user_message".to_string(),
        status: EventStatus::Ok,
        message: Some(truncate_chars(&content, MESSAGE_LIMIT)),
        timestamp,
        metadata: json!({ "source": SESSION_SOURCE, "sessionId": session_id }),
    }]
}

fn assistant_events(
    parsed: &Value,
    session_id: &str,
    timestamp: Option<String>,
) -> Vec<EventPayload> {
    let message = parsed.get("message").cloned().unwrap_or(Value::Null);
    let model = message.get("model").and_then(Value::as_str).unwrap_or("");
    let mut events = Vec::new();

    if let Some(content) = message.get("content").and_then(Value::as_array) {
        for item in content {
            match item.get("type").and_then(Value::as_str).unwrap_or("") {
                "text" => {
                    if let Some(text) = item.get("text").and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        events.push(EventPayload {
                            agent_id: LEAD_AGENT.to_string(),
                            event: "assistant_message".to_string(),
                            status: EventStatus::Ok,
                            message: Some(truncate_chars(text, MESSAGE_LIMIT)),
                            timestamp: timestamp.clone(),
                            metadata: json!({
                                "source": SESSION_SOURCE,
                                "sessionId": session_id,
                                "model": model,
                            }),
                        });
                    }
                },
                "tool_use" => {
                    let input = item.get("input").cloned().unwrap_or(json!({}));
                    let serialized = serde_json::to_string(&input).unwrap_or_default();
                    let tool_input = if serialized.len() > TOOL_INPUT_LIMIT {
                        json!({ "_truncated": true })
                    } else {
                        input
                    };
                    events.push(EventPayload {
                        agent_id: LEAD_AGENT.to_string(),
                        event: "tool_call".to_string(),
                        status: EventStatus::Ok,
                        message: Some(
                            item.get("name")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown_tool")
                                .to_string(),
                        ),
                        timestamp: timestamp.clone(),
                        metadata: json!({
                            "source": SESSION_SOURCE,
                            "sessionId": session_id,
                            "model": model,
                            "toolInput": tool_input,
                        }),
                    });
                },
                "" | "tool_result" => {},
                other => {
                    tracing::debug!(content_type = other, "Unhandled session content type");
                },
            }
        }
    }

    if let Some(usage) = message.get("usage") {
        let input_tokens = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
        let output_tokens = usage
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let cache_read = usage
            .get("cache_read_input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let total = input_tokens + output_tokens;

        if total > 0 {
            events.push(EventPayload {
                agent_id: LEAD_AGENT.to_string(),
                event: "token_usage".to_string(),
                status: EventStatus::Ok,
                message: Some(format!("tokens +{total}")),
                timestamp,
                metadata: json!({
                    "source": SESSION_SOURCE,
                    "sessionId": session_id,
                    "model": model,
                    "tokenUsage": {
                        "inputTokens": input_tokens,
                        "outputTokens": output_tokens,
                        "cacheReadInputTokens": cache_read,
                        "totalTokens": total,
                    },
                }),
            });
        }
    }

    events
}

/// Event emitted when the Claude stats cache file changes.
pub fn stats_update(stats: Value) -> EventPayload {
    EventPayload {
        agent_id: LEAD_AGENT.to_string(),
        event: "cost_update".to_string(),
        status: EventStatus::Ok,
        message: Some("stats cache updated".to_string()),
        timestamp: None,
        metadata: json!({ "source": SESSION_SOURCE, "stats": stats }),
    }
}
