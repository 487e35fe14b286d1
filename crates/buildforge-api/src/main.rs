//! The BuildForge control-plane server: wires the orchestrator client,
//! storage, secrets, Driver, and Monitor together, then serves the JSON-RPC
//! control surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use buildforge_api::{routes, AppState};
use buildforge_config::ServiceConfig;
use buildforge_driver::{Driver, DriverConfig};
use buildforge_monitor::Monitor;
use buildforge_orchestrator::HttpWorkloadClient;
use buildforge_secrets::InMemorySecretProvider;
use buildforge_storage::InMemoryStorage;
use buildforge_webhook::WebhookDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let override_path = std::env::var("BUILDFORGE_CONFIG_PATH").ok().map(std::path::PathBuf::from);
    let config = ServiceConfig::load(override_path.as_deref())?;

    let client = Arc::new(HttpWorkloadClient::with_timeout(
        config.orchestrator.base_url.clone(),
        config.orchestrator.request_timeout,
    ));
    let storage = Arc::new(InMemoryStorage::new());
    let secrets = Arc::new(InMemorySecretProvider::new());

    let driver_config = DriverConfig {
        lock_acquire_timeout: config.driver.lock_acquire_timeout,
        build_to_test_delay: config.driver.build_to_test_delay,
        ..DriverConfig::default()
    };
    let driver = Arc::new(Driver::new(client, storage.clone(), secrets, driver_config));

    let dispatcher = Arc::new(WebhookDispatcher::with_timeout(config.webhook.request_timeout));
    let monitor = Monitor::with_interval(
        driver.clone(),
        storage.clone(),
        dispatcher.clone(),
        config.monitor.poll_interval,
    );
    let registry = monitor.registry();

    info!("starting monitor loop");
    tokio::spawn(async move {
        monitor.run().await;
    });

    let state = AppState::new(driver, storage, dispatcher, registry);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
