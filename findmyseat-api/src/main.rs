use anyhow::Context;
use findmyseat_api::{app, AppState, AuthConfig};
use findmyseat_core::{BookingCoordinator, BroadcastHub, ExpirySweeper, GeofenceValidator, SystemClock};
use findmyseat_store::app_config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "findmyseat_api=debug,findmyseat_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting FindMySeat on port {}", config.server.port);

    let store = findmyseat_store::connect(&config.store)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    // Ledger events flow coordinator -> relay -> hub subscribers
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let coordinator = Arc::new(
        BookingCoordinator::hydrate(
            store,
            GeofenceValidator::new(config.venue),
            Arc::new(SystemClock),
            events_tx,
            config.seating.rows,
            config.seating.cols,
        )
        .await
        .context("Failed to load seats")?,
    );

    let hub = Arc::new(BroadcastHub::new(config.broadcast.subscriber_buffer));
    tokio::spawn(hub.clone().relay(events_rx));

    let sweeper = ExpirySweeper::new(
        coordinator.clone(),
        Duration::from_secs(config.sweeper.interval_seconds),
    );
    tokio::spawn(sweeper.run());

    let heartbeat_hub = hub.clone();
    let heartbeat_every = Duration::from_secs(config.broadcast.heartbeat_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_every);
        loop {
            ticker.tick().await;
            heartbeat_hub.heartbeat();
        }
    });

    let app_state = AppState {
        coordinator,
        hub,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
