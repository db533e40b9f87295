use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast;

use pulse_core::event::Event;
use pulse_core::frames::StreamFrame;
use pulse_core::snapshot::Snapshot;

use crate::state::{AppState, ConnectionGuard};

/// Lifecycle of one connected viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewerPhase {
    Connecting,
    Streaming,
    Closed,
}

/// Per-viewer state machine: exactly one snapshot frame on entering
/// `Streaming`, then every accepted event in acceptance order, exactly once.
///
/// A viewer that falls further behind than the broadcast capacity is closed
/// rather than allowed to skip events; it recovers by reconnecting for a
/// fresh snapshot.
struct Viewer {
    phase: ViewerPhase,
    snapshot: Option<Snapshot>,
    rx: broadcast::Receiver<Event>,
}

impl Viewer {
    fn new(snapshot: Snapshot, rx: broadcast::Receiver<Event>) -> Self {
        Self {
            phase: ViewerPhase::Connecting,
            snapshot: Some(snapshot),
            rx,
        }
    }

    /// Next frame for this viewer; `None` once the viewer is closed.
    async fn next_frame(&mut self) -> Option<StreamFrame> {
        loop {
            match self.phase {
                ViewerPhase::Connecting => {
                    self.phase = ViewerPhase::Streaming;
                    return self.snapshot.take().map(StreamFrame::snapshot);
                },
                ViewerPhase::Streaming => match self.rx.recv().await {
                    Ok(event) => return Some(StreamFrame::event(event)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Viewer fell behind the live feed, closing");
                        self.phase = ViewerPhase::Closed;
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        self.phase = ViewerPhase::Closed;
                    },
                },
                ViewerPhase::Closed => return None,
            }
        }
    }
}

/// GET /api/stream — the live feed: one snapshot, then event deltas, with
/// periodic keepalive comments that carry no payload.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let max_sse = state.config.limits.max_sse_subscribers;
    let current = state.sse_subscriber_count.load(Ordering::Relaxed);
    if current >= max_sse {
        tracing::warn!(current, max = max_sse, "SSE subscriber limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let guard = ConnectionGuard::new(Arc::clone(&state.sse_subscriber_count));

    // Subscribe and snapshot under one read lock: appends broadcast while
    // holding the write lock, so no event can land between the two.
    let viewer = {
        let store = state.store.read().await;
        let rx = store.subscribe();
        Viewer::new(store.snapshot(), rx)
    };

    let stream = futures::stream::unfold((viewer, guard), |(mut viewer, guard)| async move {
        let frame = viewer.next_frame().await?;
        match serde_json::to_string(&frame) {
            Ok(json) => Some((Ok(SseEvent::default().data(json)), (viewer, guard))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode stream frame");
                None
            },
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.limits.keepalive_secs))
            .text("keepalive"),
    ))
}
