use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::client::ApiClient;
use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::relay;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub client: ApiClient,
}

impl AppState {
    pub fn new(metrics: &Metrics, client: ApiClient) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            client,
        }
    }
}

pub fn router(state: AppState, metrics_config: &MetricsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(metrics_config))
        .merge(relay::router())
        .with_state(state)
}

/// Start the relay: `/api/*` forwarded through the authenticated client, plus `/session` and metrics.
pub async fn start(settings_config: &SettingsConfig, client: ApiClient) -> Result<()> {
    let metrics = get_metrics();
    let state = AppState::new(metrics, client);
    let app = router(state, &settings_config.metrics);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding relay to {}", bind_addr))?;
    info!("relay listening on {}", bind_addr);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")?;
    metrics.up.set(0);

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
