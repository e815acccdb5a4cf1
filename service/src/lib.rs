use config::Config;
use log::info;
use serde_json::Value;
use sse::{IngestionService, MessageHub};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod logging;

/// The hub instance served by this application: JSON payloads.
pub type NotificationHub = MessageHub<Value>;
pub type NotificationIngestion = IngestionService<Value>;

pub fn init_hub(config: &Config) -> Result<NotificationHub, sse::Error> {
    let options = config.hub_options();
    info!(
        "Hub config: channel_capacity={}, write_timeout={:?}, slow_consumer_strategy={}",
        options.channel_capacity, options.write_timeout, options.slow_consumer_strategy,
    );

    MessageHub::new(options)
}

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<NotificationHub>,
    pub ingestion: Arc<NotificationIngestion>,
    /// Cancelled when the server begins shutting down; SSE streams hang off it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        app_config: Config,
        hub: &Arc<NotificationHub>,
        ingestion: &Arc<NotificationIngestion>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config: app_config,
            hub: Arc::clone(hub),
            ingestion: Arc::clone(ingestion),
            shutdown,
        }
    }

    pub fn hub_ref(&self) -> &NotificationHub {
        self.hub.as_ref()
    }
}
