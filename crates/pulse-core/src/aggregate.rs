use std::collections::{HashMap, VecDeque};

use crate::event::{Alert, Event};
use crate::rollup::{AgentRollup, SourceRollup, StatusRow};

/// Default capacity of the recent-events ring.
pub const DEFAULT_MAX_RECENT: usize = 200;
/// Default capacity of the alerts ring.
pub const DEFAULT_MAX_ALERTS: usize = 120;

/// The in-memory aggregate: bounded recent/alert rings plus per-agent and
/// per-source rollups. All mutation funnels through [`AggregateState::append`];
/// everything else is read-only.
#[derive(Debug, Clone)]
pub struct AggregateState {
    pub(crate) recent: VecDeque<Event>,
    pub(crate) alerts: VecDeque<Alert>,
    pub(crate) by_agent: HashMap<String, AgentRollup>,
    pub(crate) by_source: HashMap<String, SourceRollup>,
    max_recent: usize,
    max_alerts: usize,
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateState {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECENT, DEFAULT_MAX_ALERTS)
    }

    pub fn with_capacity(max_recent: usize, max_alerts: usize) -> Self {
        Self {
            recent: VecDeque::new(),
            alerts: VecDeque::new(),
            by_agent: HashMap::new(),
            by_source: HashMap::new(),
            max_recent,
            max_alerts,
        }
    }

    /// Fold one event into the aggregate: rollups update, a warning/error
    /// raises an alert, and the event lands at the front of the recent ring.
    /// Oldest entries past each cap are dropped.
    pub fn append(&mut self, evt: Event) {
        self.by_agent
            .entry(evt.agent_id.clone())
            .or_insert_with(|| AgentRollup::seed(&evt))
            .record(&evt);

        self.by_source
            .entry(evt.source().to_string())
            .or_insert_with(|| SourceRollup::seed(&evt))
            .record(&evt);

        if let Some(alert) = Alert::from_event(&evt) {
            self.alerts.push_front(alert);
            self.alerts.truncate(self.max_alerts);
        }

        self.recent.push_front(evt);
        self.recent.truncate(self.max_recent);
    }

    /// Newest `limit` events, newest first.
    pub fn recent_slice(&self, limit: usize) -> Vec<Event> {
        self.recent.iter().take(limit).cloned().collect()
    }

    /// Newest `limit` alerts, newest first.
    pub fn alerts_slice(&self, limit: usize) -> Vec<Alert> {
        self.alerts.iter().take(limit).cloned().collect()
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentRollup> {
        self.by_agent.get(agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.by_agent.len()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn alert_len(&self) -> usize {
        self.alerts.len()
    }

    /// All agent rollups, ascending by agent id.
    pub fn agents_sorted(&self) -> Vec<AgentRollup> {
        let mut rows: Vec<AgentRollup> = self.by_agent.values().cloned().collect();
        rows.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        rows
    }

    /// All source rollups, ascending by source.
    pub fn sources_sorted(&self) -> Vec<SourceRollup> {
        let mut rows: Vec<SourceRollup> = self.by_source.values().cloned().collect();
        rows.sort_by(|a, b| a.source.cmp(&b.source));
        rows
    }

    /// One status row per known agent, in the same order as
    /// [`AggregateState::agents_sorted`].
    pub fn status_rows(&self) -> Vec<StatusRow> {
        self.agents_sorted()
            .iter()
            .map(|r| StatusRow::for_agent(&r.agent_id, Some(r)))
            .collect()
    }
}
