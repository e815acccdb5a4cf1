use events::MessageSource;
use log::*;
use serde_json::Value;
use service::{config::Config, logging::Logger, AppState, NotificationIngestion};
use sse::{IngestionService, IngestionState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod notification_source;

use notification_source::NotificationSource;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting up notification hub [{}]...",
        env!("CARGO_PKG_VERSION")
    );

    let hub = match service::init_hub(&config) {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            error!("Invalid hub configuration: {e}");
            std::process::exit(1);
        }
    };

    let source: Arc<dyn MessageSource<Value>> =
        Arc::new(NotificationSource::new(config.notification_interval()));
    let ingestion: Arc<NotificationIngestion> = Arc::new(
        IngestionService::new(source, Arc::clone(&hub))
            .with_shutdown_grace(config.shutdown_grace()),
    );

    if let Err(e) = ingestion.start().await {
        error!("Failed to start notification ingestion: {e}");
        std::process::exit(1);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));
    tokio::spawn(shutdown_on_fault(
        Arc::clone(&ingestion),
        shutdown.clone(),
    ));

    let app_state = AppState::new(config, &hub, &ingestion, shutdown.clone());
    let server_result = web::init_server(app_state).await;

    // The server may also have stopped on its own (e.g. failed to bind).
    shutdown.cancel();

    let ingestion_result = ingestion.stop().await;
    hub.shutdown();

    let mut exit_code = 0;
    if let Err(e) = server_result {
        error!("Server error: {e}");
        exit_code = 1;
    }
    if let Err(e) = ingestion_result {
        error!("Notification ingestion ended with an error: {e}");
        exit_code = 1;
    }

    info!("Notification hub stopped");
    std::process::exit(exit_code);
}

async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down..."),
        Err(e) => error!("Unable to listen for Ctrl-C, shutting down: {e}"),
    }
    shutdown.cancel();
}

async fn shutdown_on_fault(ingestion: Arc<NotificationIngestion>, shutdown: CancellationToken) {
    let mut state = ingestion.watch_state();
    drop(ingestion);

    tokio::select! {
        _ = shutdown.cancelled() => {}
        faulted = state.wait_for(|state| *state == IngestionState::Faulted) => {
            if faulted.is_ok() {
                error!("Notification ingestion faulted, shutting down...");
                shutdown.cancel();
            }
        }
    }
}
