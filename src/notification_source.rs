use async_trait::async_trait;
use chrono::Local;
use events::{Message, MessageHandler, MessageSource};
use log::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Every n-th notification is flagged as high importance.
const HIGH_IMPORTANCE_EVERY: u64 = 3;

/// Demo source: emits a system notification on a fixed interval, the first
/// one immediately.
pub struct NotificationSource {
    interval: Duration,
}

impl NotificationSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    fn notification(sequence: u64) -> Message<Value> {
        let importance = if sequence % HIGH_IMPORTANCE_EVERY == 0 {
            "High"
        } else {
            "Normal"
        };
        let text = format!(
            "Notification #{sequence} at {}",
            Local::now().format("%H:%M:%S")
        );

        Message::new(json!({ "sequence": sequence, "text": text }))
            .with_metadata("type", "System")
            .with_metadata("importance", importance)
            .with_event_type("notification")
    }
}

#[async_trait]
impl MessageSource<Value> for NotificationSource {
    async fn start(
        &self,
        handler: Arc<dyn MessageHandler<Value>>,
        cancel: CancellationToken,
    ) -> events::Result<()> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Notification source cancelled after {sequence} notifications");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            sequence += 1;
            let message = Self::notification(sequence);
            let message_id = message.id().to_string();

            if let Err(e) = handler.handle(message).await {
                warn!("Notification {message_id} was not delivered: {e}");
            }
        }
    }

    fn name(&self) -> &str {
        "notifications"
    }
}
