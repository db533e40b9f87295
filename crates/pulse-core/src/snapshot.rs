use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateState;
use crate::event::{Alert, Event};
use crate::rollup::{AgentRollup, SourceRollup, StatusRow};

/// How many recent events a snapshot exposes.
pub const SNAPSHOT_RECENT_LIMIT: usize = 50;
/// How many alerts a snapshot exposes.
pub const SNAPSHOT_ALERT_LIMIT: usize = 20;

/// Counter sums across all agent rollups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub agents: usize,
    pub total: u64,
    pub ok: u64,
    pub warning: u64,
    pub error: u64,
    pub token_total: u64,
}

/// A complete, self-consistent point-in-time view of the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub totals: Totals,
    pub agents: Vec<AgentRollup>,
    pub sources: Vec<SourceRollup>,
    pub recent: Vec<Event>,
    pub alerts: Vec<Alert>,
    pub workflow_progress: Vec<StatusRow>,
}

impl AggregateState {
    /// Derive a snapshot without mutating anything. Rollup lists are sorted
    /// ascending by key and the status table mirrors the agent ordering.
    pub fn snapshot(&self, generated_at: DateTime<Utc>) -> Snapshot {
        let agents = self.agents_sorted();
        let sources = self.sources_sorted();
        let workflow_progress = agents
            .iter()
            .map(|r| StatusRow::for_agent(&r.agent_id, Some(r)))
            .collect();

        Snapshot {
            generated_at,
            totals: self.totals(),
            agents,
            sources,
            recent: self.recent_slice(SNAPSHOT_RECENT_LIMIT),
            alerts: self.alerts_slice(SNAPSHOT_ALERT_LIMIT),
            workflow_progress,
        }
    }

    pub fn totals(&self) -> Totals {
        self.by_agent.values().fold(
            Totals {
                agents: self.by_agent.len(),
                ..Totals::default()
            },
            |mut acc, rollup| {
                acc.total += rollup.total;
                acc.ok += rollup.ok;
                acc.warning += rollup.warning;
                acc.error += rollup.error;
                acc.token_total += rollup.token_total;
                acc
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventStatus;
    use crate::test_helpers::{make_event, make_event_at, ts};

    fn populated_state() -> AggregateState {
        let mut state = AggregateState::new();
        state.append(make_event("zeta", EventStatus::Ok));
        state.append(make_event("alpha", EventStatus::Error));
        state.append(make_event("alpha", EventStatus::Ok));
        let mut sourced = make_event("mid", EventStatus::Warning);
        sourced
            .metadata
            .insert("source".to_string(), serde_json::json!("codex_log"));
        state.append(sourced);
        state
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let snapshot = populated_state().snapshot(ts(500));
        let agent_ids: Vec<&str> = snapshot.agents.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(agent_ids, vec!["alpha", "mid", "zeta"]);
        let sources: Vec<&str> = snapshot.sources.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["codex_log", "manual"]);
    }

    #[test]
    fn snapshot_totals_sum_rollups() {
        let snapshot = populated_state().snapshot(ts(500));
        assert_eq!(snapshot.totals.agents, 3);
        assert_eq!(snapshot.totals.total, 4);
        assert_eq!(snapshot.totals.ok, 2);
        assert_eq!(snapshot.totals.warning, 1);
        assert_eq!(snapshot.totals.error, 1);
        assert_eq!(
            snapshot.totals.total,
            snapshot.totals.ok + snapshot.totals.warning + snapshot.totals.error
        );
    }

    #[test]
    fn status_table_mirrors_agent_ordering() {
        let snapshot = populated_state().snapshot(ts(500));
        assert_eq!(snapshot.workflow_progress.len(), snapshot.agents.len());
        for (row, rollup) in snapshot.workflow_progress.iter().zip(&snapshot.agents) {
            assert_eq!(row.agent_id, rollup.agent_id);
            assert!(row.active);
        }
    }

    #[test]
    fn snapshot_slices_are_bounded() {
        let mut state = AggregateState::new();
        for i in 0..120 {
            state.append(make_event_at("lead", EventStatus::Warning, ts(i)));
        }
        let snapshot = state.snapshot(ts(999));
        assert_eq!(snapshot.recent.len(), SNAPSHOT_RECENT_LIMIT);
        assert_eq!(snapshot.alerts.len(), SNAPSHOT_ALERT_LIMIT);
        // Newest first in both slices.
        assert_eq!(snapshot.recent[0].received_at, ts(119));
        assert_eq!(snapshot.alerts[0].created_at, ts(119));
    }

    #[test]
    fn snapshot_does_not_mutate_state() {
        let state = populated_state();
        let before = state.snapshot(ts(1));
        let after = state.snapshot(ts(1));
        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_wire_shape() {
        let snapshot = populated_state().snapshot(ts(500));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("generatedAt").is_some());
        assert!(json.get("workflowProgress").is_some());
        assert!(json["totals"].get("tokenTotal").is_some());
    }
}
