use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::transform::EventPayload;

/// A submission to the monitor failed. The caller logs it and drops the
/// event; there is no retry queue.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("monitor request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("monitor rejected event ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

/// HTTP client for the monitor's ingestion endpoint. Requests carry a bound
/// on how long they may hang, so a stuck submission cannot stall the poll
/// loop.
pub struct MonitorClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl MonitorClient {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pulse-collector/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, url, token }
    }

    /// Post one event; any non-2xx response is an error.
    pub async fn post_event(&self, payload: &EventPayload) -> Result<(), SubmitError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected { status, body });
        }
        Ok(())
    }
}
