use chrono::Utc;
use tokio::sync::broadcast;

use pulse_core::aggregate::{AggregateState, DEFAULT_MAX_ALERTS, DEFAULT_MAX_RECENT};
use pulse_core::event::{Alert, Event};
use pulse_core::normalize::{ReceiptClock, normalize_event};
use pulse_core::snapshot::Snapshot;

/// Default broadcast channel capacity for live fan-out.
const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Store counters exposed by the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub agents: usize,
    pub events_total: u64,
    pub recent_buffered: usize,
    pub alerts_buffered: usize,
}

/// The single authoritative aggregate, with a broadcast channel fanning each
/// accepted event out to live viewers. Callers wrap it in `Arc<RwLock<_>>`;
/// the write lock is what makes each append atomic relative to snapshot
/// reads and other appends.
pub struct MonitorStore {
    state: AggregateState,
    clock: ReceiptClock,
    broadcast_tx: broadcast::Sender<Event>,
}

impl Default for MonitorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStore {
    pub fn new() -> Self {
        Self::with_capacity(
            DEFAULT_MAX_RECENT,
            DEFAULT_MAX_ALERTS,
            DEFAULT_BROADCAST_CAPACITY,
        )
    }

    pub fn with_capacity(
        max_recent: usize,
        max_alerts: usize,
        broadcast_capacity: usize,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            state: AggregateState::with_capacity(max_recent, max_alerts),
            clock: ReceiptClock::new(),
            broadcast_tx,
        }
    }

    /// Normalize a loose payload and append it. `receivedAt` is stamped here,
    /// under the caller's write access, so stamps are monotone in acceptance
    /// order.
    pub fn ingest(&mut self, payload: &serde_json::Value) -> Event {
        let received_at = self.clock.stamp();
        let evt = normalize_event(payload, received_at);
        self.append(evt.clone());
        evt
    }

    /// Append an already-normalized event, then notify subscribers with
    /// exactly this event, at most once.
    pub fn append(&mut self, evt: Event) {
        self.state.append(evt.clone());
        let _ = self.broadcast_tx.send(evt);
    }

    /// Point-in-time snapshot of the aggregate; read-only.
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot(Utc::now())
    }

    /// Newest `limit` alerts.
    pub fn alerts(&self, limit: usize) -> Vec<Alert> {
        self.state.alerts_slice(limit)
    }

    /// Subscribe to the live event fan-out.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcast_tx.subscribe()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            agents: self.state.agent_count(),
            events_total: self.state.totals().total,
            recent_buffered: self.state.recent_len(),
            alerts_buffered: self.state.alert_len(),
        }
    }
}
