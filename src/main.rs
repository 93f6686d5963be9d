// Main entry point - Dependency injection and acquisition startup
use std::future::IntoFuture;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use sensegrid_dashboard::application::polling_service::PollingAdapter;
use sensegrid_dashboard::application::scheduler::{run_clock, run_polling};
use sensegrid_dashboard::application::store_handle::StoreHandle;
use sensegrid_dashboard::application::stream_service::{StreamAdapter, TopicScheme};
use sensegrid_dashboard::domain::store::TelemetryStore;
use sensegrid_dashboard::infrastructure::config::{load_config, AcquisitionMode, DashboardConfig};
use sensegrid_dashboard::infrastructure::http_api::HttpTelemetryApi;
use sensegrid_dashboard::infrastructure::mqtt_feed::run_feed;
use sensegrid_dashboard::presentation::app_state::AppState;
use sensegrid_dashboard::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_config()?;

    // One store per session, shared by the acquisition side and the renderer feed
    let store = StoreHandle::new(TelemetryStore::new(config.dashboard.buffer_capacity));
    tokio::spawn(run_clock(store.clone(), config.dashboard.clock_period()));

    let state = Arc::new(AppState {
        store: store.clone(),
    });
    let addr: SocketAddr = config.dashboard.listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting sensegrid-dashboard on {}", addr);
    let server = axum::serve(listener, router(state)).into_future();

    tokio::select! {
        result = server => result?,
        result = acquire(config, store) => result?,
    }

    Ok(())
}

/// Run the configured acquisition adapter. Returns only when the session ends.
async fn acquire(config: DashboardConfig, store: StoreHandle) -> anyhow::Result<()> {
    let sensor_types = config.dashboard.sensor_types.clone();

    match config.dashboard.mode {
        AcquisitionMode::Polling => {
            let api = Arc::new(HttpTelemetryApi::new(&config.api)?);
            let adapter = Arc::new(PollingAdapter::new(
                api,
                store,
                sensor_types,
                config.polling.strategy,
                config.polling.time_range(),
            ));

            // Sender stays alive for the session so the cadence can be retuned.
            let (_interval_tx, interval_rx) = watch::channel(config.polling.interval());
            let expired = run_polling(adapter, interval_rx).await;
            anyhow::bail!("{}", expired)
        }
        AcquisitionMode::Stream => {
            let adapter = Arc::new(StreamAdapter::new(
                store,
                TopicScheme::new(config.stream.topic_prefix.clone()),
                config.stream.devices.clone(),
                sensor_types,
            ));
            run_feed(adapter, config.stream).await;
            Ok(())
        }
    }
}
