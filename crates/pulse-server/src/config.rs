use serde::Deserialize;

/// Top-level server configuration, loaded from `pulse.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5050".to_string(),
            web_root: "public".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// Bearer token required to submit events. None = ingestion is open.
    pub bearer_token: Option<String>,
}

/// Infrastructure limits (buffer caps, batch sizes, connection caps).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Recent-events ring capacity in the store.
    pub max_recent_events: usize,
    /// Alerts ring capacity in the store.
    pub max_alerts: usize,
    /// Broadcast channel capacity for live fan-out; a viewer falling this
    /// far behind is closed and must resync.
    pub broadcast_capacity: usize,
    /// Maximum events accepted in one ingestion request.
    pub event_batch_limit: usize,
    /// Maximum concurrent live-stream viewers.
    pub max_sse_subscribers: usize,
    /// Maximum ingestion request body size in bytes.
    pub max_body_bytes: usize,
    /// Seconds between keepalive comments on the live stream.
    pub keepalive_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_recent_events: 200,
            max_alerts: 120,
            broadcast_capacity: 1024,
            event_batch_limit: 100,
            max_sse_subscribers: 100,
            max_body_bytes: 1024 * 1024,
            keepalive_secs: 15,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.auth.bearer_token.is_none() {
            tracing::warn!("No bearer token configured — event ingestion is unauthenticated");
        }

        if self.limits.max_recent_events == 0 {
            tracing::error!("limits.max_recent_events must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_alerts == 0 {
            tracing::error!("limits.max_alerts must be > 0");
            std::process::exit(1);
        }
        if self.limits.broadcast_capacity == 0 {
            tracing::error!("limits.broadcast_capacity must be > 0");
            std::process::exit(1);
        }
        if self.limits.event_batch_limit == 0 {
            tracing::error!("limits.event_batch_limit must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_sse_subscribers == 0 {
            tracing::error!("limits.max_sse_subscribers must be > 0");
            std::process::exit(1);
        }
        if self.limits.keepalive_secs == 0 {
            tracing::error!("limits.keepalive_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `pulse.toml` if it exists, then apply env overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("pulse.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from pulse.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse pulse.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No pulse.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("PULSE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("PULSE_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(token) = std::env::var("PULSE_API_TOKEN")
            && !token.is_empty()
        {
            config.auth.bearer_token = Some(token);
        }
        if let Ok(val) = std::env::var("PULSE_MAX_RECENT_EVENTS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_recent_events = n;
        }
        if let Ok(val) = std::env::var("PULSE_MAX_ALERTS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_alerts = n;
        }
        if let Ok(val) = std::env::var("PULSE_MAX_SSE_SUBSCRIBERS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_sse_subscribers = n;
        }
        if let Ok(val) = std::env::var("PULSE_EVENT_BATCH_LIMIT")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.event_batch_limit = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "127.0.0.1:5050");
        assert_eq!(cfg.web_root, "public");
        assert!(cfg.auth.bearer_token.is_none());
    }

    #[test]
    fn default_limits() {
        let cfg = LimitsConfig::default();
        assert_eq!(cfg.max_recent_events, 200);
        assert_eq!(cfg.max_alerts, 120);
        assert_eq!(cfg.broadcast_capacity, 1024);
        assert_eq!(cfg.event_batch_limit, 100);
        assert_eq!(cfg.max_sse_subscribers, 100);
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
        assert_eq!(cfg.keepalive_secs, 15);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:8080"
web_root = "/var/www/pulse"

[auth]
bearer_token = "secret123"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.web_root, "/var/www/pulse");
        assert_eq!(cfg.auth.bearer_token.as_deref(), Some("secret123"));
    }

    #[test]
    fn parse_limits_toml() {
        let toml_str = r#"
[limits]
max_recent_events = 500
max_alerts = 60
broadcast_capacity = 256
event_batch_limit = 10
max_sse_subscribers = 4
max_body_bytes = 4096
keepalive_secs = 30
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.limits.max_recent_events, 500);
        assert_eq!(cfg.limits.max_alerts, 60);
        assert_eq!(cfg.limits.broadcast_capacity, 256);
        assert_eq!(cfg.limits.event_batch_limit, 10);
        assert_eq!(cfg.limits.max_sse_subscribers, 4);
        assert_eq!(cfg.limits.max_body_bytes, 4096);
        assert_eq!(cfg.limits.keepalive_secs, 30);
    }

    #[test]
    fn missing_limits_uses_defaults() {
        let cfg: ServerConfig = toml::from_str("listen_addr = \"127.0.0.1:9999\"").unwrap();
        assert_eq!(cfg.limits.max_recent_events, 200);
        assert_eq!(cfg.limits.event_batch_limit, 100);
    }

    #[test]
    fn validate_accepts_default_config() {
        ServerConfig::default().validate();
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        // validate() calls process::exit, so test the underlying check
        assert!(cfg.listen_addr.parse::<std::net::SocketAddr>().is_err());
    }
}
