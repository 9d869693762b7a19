use std::sync::Arc;

use driver_dispatch_client::api;
use driver_dispatch_client::backend::HttpBackend;
use driver_dispatch_client::config::{Config, LogFormat};
use driver_dispatch_client::engine::binding::bind_channel;
use driver_dispatch_client::engine::duty::DutyState;
use driver_dispatch_client::error::AppError;
use driver_dispatch_client::identity::Identity;
use driver_dispatch_client::observability::metrics::Metrics;
use driver_dispatch_client::state::{AppState, Settings};
use driver_dispatch_client::transport::{ChannelConfig, SocketChannel};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let identity = Identity::from_config(&config);
    let metrics = Metrics::new();

    let backend = Arc::new(
        HttpBackend::new(
            &config.api_domain_url,
            config.rest_timeout,
            config.rest_max_attempts,
        )
        .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?,
    );

    let channel = Arc::new(SocketChannel::new(
        ChannelConfig {
            url: config.socket_url.clone(),
            reconnect_delay: config.reconnect_delay,
        },
        metrics.clone(),
    ));

    let duty = DutyState::load(&config.duty_state_path).await;
    let state = Arc::new(AppState::new(
        identity.clone(),
        channel.clone(),
        backend.clone(),
        backend,
        duty,
        &Settings::from(&config),
        metrics.clone(),
    ));

    if let Err(err) = state.refresh_profile().await {
        tracing::warn!(error = %err, "driver profile unavailable; reporting without vehicle details");
    }

    bind_channel(&channel, &state.coordinator, &metrics);
    channel.connect(&identity);

    let app = api::rest::router(state.clone());

    let bind_addr = format!("{}:{}", config.http_bind, config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        driver_id = identity.driver_id,
        "driver client started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    state.reporter.stop();
    channel.disconnect();
    tracing::info!("driver client stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
