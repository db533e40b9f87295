use std::path::PathBuf;
use std::time::Duration;

/// Collector settings, read from the environment.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Ingestion endpoint of the monitor.
    pub monitor_url: String,
    /// Bearer token for the monitor, if it requires one.
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    /// History lines re-emitted at boot; 0 disables backfill.
    pub backfill_lines: usize,
    /// When true (the default) cursors start at end-of-file; otherwise the
    /// whole backlog replays from byte 0.
    pub skip_backlog: bool,
    pub claude_home: Option<PathBuf>,
    pub codex_home: Option<PathBuf>,
    /// Bound on how long one submission may hang.
    pub request_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            monitor_url: "http://127.0.0.1:5050/api/events".to_string(),
            api_token: None,
            poll_interval: Duration::from_millis(2500),
            backfill_lines: 25,
            skip_backlog: true,
            claude_home: home_join(".claude"),
            codex_home: home_join(".codex"),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl CollectorConfig {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PULSE_MONITOR_URL")
            && !url.is_empty()
        {
            config.monitor_url = url;
        }
        if let Ok(token) = std::env::var("PULSE_API_TOKEN")
            && !token.is_empty()
        {
            config.api_token = Some(token);
        }
        if let Ok(val) = std::env::var("PULSE_POLL_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.poll_interval = Duration::from_millis(ms.max(100));
        }
        if let Ok(val) = std::env::var("PULSE_BACKFILL_LINES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.backfill_lines = n;
        }
        if let Ok(val) = std::env::var("PULSE_REPLAY_BACKLOG") {
            let replay = val == "1" || val.eq_ignore_ascii_case("true");
            config.skip_backlog = !replay;
        }
        if let Ok(dir) = std::env::var("CLAUDE_HOME")
            && !dir.is_empty()
        {
            config.claude_home = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("CODEX_HOME")
            && !dir.is_empty()
        {
            config.codex_home = Some(PathBuf::from(dir));
        }
        config
    }

    pub fn claude_history_file(&self) -> Option<PathBuf> {
        self.claude_home.as_ref().map(|home| home.join("history.jsonl"))
    }

    pub fn claude_projects_dir(&self) -> Option<PathBuf> {
        self.claude_home.as_ref().map(|home| home.join("projects"))
    }

    pub fn claude_stats_cache(&self) -> Option<PathBuf> {
        self.claude_home
            .as_ref()
            .map(|home| home.join("stats-cache.json"))
    }

    pub fn codex_history_file(&self) -> Option<PathBuf> {
        self.codex_home.as_ref().map(|home| home.join("history.jsonl"))
    }

    pub fn codex_log_file(&self) -> Option<PathBuf> {
        self.codex_home
            .as_ref()
            .map(|home| home.join("log").join("codex-tui.log"))
    }
}

fn home_join(dir: &str) -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(dir))
}
