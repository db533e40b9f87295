use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pulse_collector::config::CollectorConfig;
use pulse_collector::poller::Collector;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = CollectorConfig::from_env();
    tracing::info!(monitor = %config.monitor_url, "Pulse collector starting");
    if let Some(ref home) = config.claude_home {
        tracing::info!(path = %home.display(), "Watching Claude home");
    }
    if let Some(ref home) = config.codex_home {
        tracing::info!(path = %home.display(), "Watching Codex home");
    }

    let cancel = CancellationToken::new();
    let runtime = tokio::spawn(Collector::new(config).run(cancel.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
    cancel.cancel();
    let _ = runtime.await;
}
