use crate::aggregate::AggregateState;
use crate::event::Event;
use crate::rollup::{AgentRollup, DerivedStatus, SourceRollup, StatusRow, derived_status};
use crate::snapshot::{SNAPSHOT_ALERT_LIMIT, SNAPSHOT_RECENT_LIMIT, Snapshot, Totals};

/// Viewer-side mirror of the aggregate: seeded from one snapshot, advanced
/// by the events streamed after it.
///
/// Replay reuses [`AggregateState`] and the shared [`derived_status`] rule,
/// so a viewer that applies every streamed event reports exactly the rollups
/// and statuses a direct snapshot query would.
#[derive(Debug, Clone)]
pub struct LiveView {
    state: AggregateState,
}

impl LiveView {
    /// Seed from a snapshot. Ring capacities match what snapshots expose so
    /// the visible windows stay comparable as events are applied.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut state =
            AggregateState::with_capacity(SNAPSHOT_RECENT_LIMIT, SNAPSHOT_ALERT_LIMIT);
        state.recent = snapshot.recent.iter().cloned().collect();
        state.alerts = snapshot.alerts.iter().cloned().collect();
        state.by_agent = snapshot
            .agents
            .iter()
            .map(|r| (r.agent_id.clone(), r.clone()))
            .collect();
        state.by_source = snapshot
            .sources
            .iter()
            .map(|r| (r.source.clone(), r.clone()))
            .collect();
        Self { state }
    }

    /// Apply one streamed event, the same way the server applies it.
    pub fn apply_event(&mut self, evt: Event) {
        self.state.append(evt);
    }

    /// Discard everything and start over from a fresh snapshot. This is the
    /// recovery path after the live feed is lost.
    pub fn resync(&mut self, snapshot: &Snapshot) {
        *self = Self::from_snapshot(snapshot);
    }

    pub fn totals(&self) -> Totals {
        self.state.totals()
    }

    pub fn agents(&self) -> Vec<AgentRollup> {
        self.state.agents_sorted()
    }

    pub fn sources(&self) -> Vec<SourceRollup> {
        self.state.sources_sorted()
    }

    pub fn status_rows(&self) -> Vec<StatusRow> {
        self.state.status_rows()
    }

    /// Derived status for one agent; unknown agents read as idle.
    pub fn status_of(&self, agent_id: &str) -> DerivedStatus {
        derived_status(self.state.agent(agent_id))
    }
}
