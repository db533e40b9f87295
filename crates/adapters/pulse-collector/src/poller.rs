use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::submit::MonitorClient;
use crate::tailer::{DeltaTailer, read_tail_lines};
use crate::transform::{self, EventPayload};

/// Stats cache files past this size are skipped instead of parsed.
const MAX_STATS_CACHE_BYTES: usize = 512 * 1024;

/// How a tailed file's read failures surface.
#[derive(Clone, Copy, PartialEq)]
enum FailurePolicy {
    /// Report a collector_error event to the monitor (and log).
    Report,
    /// Log only; session files come and go routinely.
    LogOnly,
}

/// Polls the configured agent log files and forwards events to the monitor.
/// Events from one file always reach the monitor in file order.
pub struct Collector {
    config: CollectorConfig,
    tailer: DeltaTailer,
    client: MonitorClient,
    stats_cache_mtime: Option<SystemTime>,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        let client = MonitorClient::new(
            config.monitor_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        );
        Self {
            config,
            tailer: DeltaTailer::new(),
            client,
            stats_cache_mtime: None,
        }
    }

    /// Backfill, position cursors, then poll until cancelled. Cancellation
    /// is cooperative, checked once per cycle.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.boot().await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }
            self.poll_cycle().await;
        }
        tracing::info!("Collector stopped");
    }

    async fn boot(&mut self) {
        if self.config.backfill_lines > 0 {
            if let Some(history) = self.config.claude_history_file() {
                self.backfill(&history, transform::claude::history_line_to_events)
                    .await;
            }
            if let Some(history) = self.config.codex_history_file() {
                self.backfill(&history, transform::codex::history_line_to_events)
                    .await;
            }
            if let Some(log) = self.config.codex_log_file() {
                self.backfill(&log, transform::codex::log_line_to_events).await;
            }
        }

        if self.config.skip_backlog {
            for path in self.tracked_files() {
                if let Err(e) = self.tailer.seek_to_end(&path) {
                    tracing::warn!(error = %e, "File not found yet, will retry on poll");
                }
            }
        }
    }

    fn tracked_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        files.extend(self.config.claude_history_file());
        files.extend(self.config.codex_history_file());
        files.extend(self.config.codex_log_file());
        if let Some(projects) = self.config.claude_projects_dir() {
            files.extend(session_files(&projects));
        }
        files
    }

    async fn poll_cycle(&mut self) {
        if let Some(history) = self.config.claude_history_file() {
            self.poll_file(
                &history,
                transform::claude::history_line_to_events,
                FailurePolicy::Report,
            )
            .await;
        }
        self.poll_claude_sessions().await;
        if let Some(history) = self.config.codex_history_file() {
            self.poll_file(
                &history,
                transform::codex::history_line_to_events,
                FailurePolicy::Report,
            )
            .await;
        }
        if let Some(log) = self.config.codex_log_file() {
            self.poll_file(
                &log,
                transform::codex::log_line_to_events,
                FailurePolicy::Report,
            )
            .await;
        }
        self.poll_stats_cache().await;
    }

    /// Tail one file and submit whatever its transformer makes of the new
    /// lines. A single unparsable line skips only itself; a submission
    /// failure drops only that event.
    async fn poll_file(
        &mut self,
        path: &Path,
        transform: fn(&str) -> Vec<EventPayload>,
        on_failure: FailurePolicy,
    ) {
        let lines = match self.tailer.read_delta(path) {
            Ok(lines) => lines,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %path.display(), "Tailed file does not exist yet");
                return;
            },
            Err(e) => {
                tracing::warn!(error = %e, "Tail read failed, will retry next cycle");
                if on_failure == FailurePolicy::Report {
                    self.submit(&transform::collector_error(&e.to_string())).await;
                }
                return;
            },
        };

        for line in lines {
            for payload in transform(&line) {
                self.submit(&payload).await;
            }
        }
    }

    async fn poll_claude_sessions(&mut self) {
        let Some(projects) = self.config.claude_projects_dir() else {
            return;
        };
        let files = session_files(&projects);

        // Forget cursors for session files that disappeared.
        let live: HashSet<PathBuf> = files.iter().cloned().collect();
        self.tailer
            .retain_paths(|path| !path.starts_with(&projects) || live.contains(path));

        for file in files {
            self.poll_file(
                &file,
                transform::claude::session_line_to_events,
                FailurePolicy::LogOnly,
            )
            .await;
        }
    }

    /// Emit a cost_update event when the stats cache file changes.
    async fn poll_stats_cache(&mut self) {
        let Some(path) = self.config.claude_stats_cache() else {
            return;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            return;
        };
        let Ok(mtime) = meta.modified() else {
            return;
        };
        if self.stats_cache_mtime == Some(mtime) {
            return;
        }
        self.stats_cache_mtime = Some(mtime);

        match std::fs::read_to_string(&path) {
            Ok(content) if content.len() > MAX_STATS_CACHE_BYTES => {
                tracing::warn!(bytes = content.len(), "Stats cache too large, skipping");
            },
            Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(stats) => self.submit(&transform::claude::stats_update(stats)).await,
                Err(e) => tracing::warn!(error = %e, "Stats cache parse failed"),
            },
            Err(e) => tracing::warn!(error = %e, "Stats cache read failed"),
        }
    }

    /// Re-emit the newest history lines so a fresh monitor is not empty.
    async fn backfill(&self, path: &Path, transform: fn(&str) -> Vec<EventPayload>) {
        let lines = match read_tail_lines(path, self.config.backfill_lines) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::debug!(error = %e, "Backfill skipped");
                return;
            },
        };
        for line in lines {
            for payload in transform(&line) {
                self.submit(&payload).await;
            }
        }
    }

    /// Failures are logged and the event dropped; the rest of the batch
    /// continues.
    async fn submit(&self, payload: &EventPayload) {
        if let Err(e) = self.client.post_event(payload).await {
            tracing::warn!(error = %e, event = %payload.event, "Dropped event submission");
        }
    }
}

/// Session transcript files: `<projects>/<dir>/*.jsonl`, one level deep.
fn session_files(projects: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(projects) else {
        return files;
    };
    for entry in entries.flatten() {
        let sub_dir = entry.path();
        if !sub_dir.is_dir() {
            continue;
        }
        let Ok(sub_entries) = std::fs::read_dir(&sub_dir) else {
            continue;
        };
        for sub_entry in sub_entries.flatten() {
            let path = sub_entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
    }
    files
}
