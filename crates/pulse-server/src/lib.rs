pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod sse;
pub mod state;
pub mod store;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let body_limit = config.limits.max_body_bytes;
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route(
            "/events",
            axum::routing::get(api::get_snapshot).post(api::submit_events),
        )
        .route("/alerts", axum::routing::get(api::get_alerts))
        .route("/stream", axum::routing::get(sse::event_stream))
        .route("/health", axum::routing::get(health::health_check))
        .layer(DefaultBodyLimit::max(body_limit));

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}
