use std::net::SocketAddr;
use std::time::Duration;

use pulse_server::build_app;
use pulse_server::config::{AuthFileConfig, ServerConfig};

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth and default limits.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server that requires a bearer token for ingestion.
    pub async fn with_auth(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                bearer_token: Some(token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn events_url(&self) -> String {
        format!("{}/api/events", self.base_url())
    }

    pub fn stream_url(&self) -> String {
        format!("{}/api/stream", self.base_url())
    }
}

/// Submission payload for a test event.
pub fn event_payload(agent_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "agentId": agent_id,
        "event": "tool_call",
        "status": status,
        "message": format!("{agent_id} ran a tool"),
        "metadata": { "source": "integration" }
    })
}

/// Parse the JSON payloads out of raw SSE text, ignoring keepalive comments.
pub fn parse_sse_frames(raw: &str) -> Vec<serde_json::Value> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str(data.trim_start()).ok())
        .collect()
}

/// Read the SSE response until `count` frames have arrived or the timeout
/// hits, returning whatever parsed by then.
pub async fn read_frames(
    resp: &mut reqwest::Response,
    count: usize,
    timeout: Duration,
) -> Vec<serde_json::Value> {
    let mut collected = String::new();
    let mut frames = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while frames.len() < count {
            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    collected.push_str(&String::from_utf8_lossy(&bytes));
                    frames = parse_sse_frames(&collected);
                },
                _ => break,
            }
        }
    })
    .await;
    frames
}
