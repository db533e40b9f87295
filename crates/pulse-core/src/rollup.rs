use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventStatus};

/// Cumulative counters for one agent id. Created on the agent's first event,
/// never removed while the process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRollup {
    pub agent_id: String,
    pub last_seen: DateTime<Utc>,
    pub total: u64,
    pub ok: u64,
    pub warning: u64,
    pub error: u64,
    pub token_total: u64,
    pub last_event: String,
    pub last_latency_ms: Option<f64>,
}

impl AgentRollup {
    /// Zeroed rollup for the agent an event belongs to.
    pub fn seed(evt: &Event) -> Self {
        Self {
            agent_id: evt.agent_id.clone(),
            last_seen: evt.received_at,
            total: 0,
            ok: 0,
            warning: 0,
            error: 0,
            token_total: 0,
            last_event: evt.event.clone(),
            last_latency_ms: None,
        }
    }

    /// Fold one event into the counters.
    pub fn record(&mut self, evt: &Event) {
        self.last_seen = evt.received_at;
        self.total += 1;
        self.last_event = evt.event.clone();
        self.last_latency_ms = evt.latency_ms;
        match evt.status {
            EventStatus::Error => self.error += 1,
            EventStatus::Warning => self.warning += 1,
            EventStatus::Ok => self.ok += 1,
        }
        self.token_total += evt.token_delta();
    }
}

/// Same counters keyed by `metadata.source` instead of agent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRollup {
    pub source: String,
    pub last_seen: DateTime<Utc>,
    pub total: u64,
    pub ok: u64,
    pub warning: u64,
    pub error: u64,
    pub token_total: u64,
    pub last_event: String,
    pub last_latency_ms: Option<f64>,
}

impl SourceRollup {
    pub fn seed(evt: &Event) -> Self {
        Self {
            source: evt.source().to_string(),
            last_seen: evt.received_at,
            total: 0,
            ok: 0,
            warning: 0,
            error: 0,
            token_total: 0,
            last_event: evt.event.clone(),
            last_latency_ms: None,
        }
    }

    pub fn record(&mut self, evt: &Event) {
        self.last_seen = evt.received_at;
        self.total += 1;
        self.last_event = evt.event.clone();
        self.last_latency_ms = evt.latency_ms;
        match evt.status {
            EventStatus::Error => self.error += 1,
            EventStatus::Warning => self.warning += 1,
            EventStatus::Ok => self.ok += 1,
        }
        self.token_total += evt.token_delta();
    }
}

/// Workflow status derived purely from a rollup's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivedStatus {
    Blocked,
    AtRisk,
    Running,
    Idle,
}

/// The one status-derivation rule. The snapshot builder and viewer-side
/// replay both go through here; the two paths must never diverge.
pub fn derived_status(rollup: Option<&AgentRollup>) -> DerivedStatus {
    match rollup {
        Some(r) if r.error > 0 => DerivedStatus::Blocked,
        Some(r) if r.warning > 0 => DerivedStatus::AtRisk,
        Some(r) if r.total > 0 => DerivedStatus::Running,
        _ => DerivedStatus::Idle,
    }
}

/// One row of the per-agent status table. Agents without a rollup get an
/// inactive placeholder row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRow {
    pub agent_id: String,
    pub active: bool,
    pub status: DerivedStatus,
    pub total: u64,
    pub last_event: String,
    pub last_seen: Option<DateTime<Utc>>,
}

impl StatusRow {
    pub fn for_agent(agent_id: &str, rollup: Option<&AgentRollup>) -> Self {
        match rollup {
            Some(r) => Self {
                agent_id: r.agent_id.clone(),
                active: true,
                status: derived_status(Some(r)),
                total: r.total,
                last_event: r.last_event.clone(),
                last_seen: Some(r.last_seen),
            },
            None => Self {
                agent_id: agent_id.to_string(),
                active: false,
                status: DerivedStatus::Idle,
                total: 0,
                last_event: "-".to_string(),
                last_seen: None,
            },
        }
    }
}
