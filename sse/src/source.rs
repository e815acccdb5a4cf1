use async_trait::async_trait;
use events::{Error, ErrorKind, Message, MessageHandler, MessageSource, Payload, SourceErrorKind};
use log::*;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// A message source fed through a tokio channel.
///
/// Lets application code (or tests) push messages into an ingestion loop:
/// whatever is sent on the returned `Sender` is handed to the hub in order.
/// The source finishes when it is cancelled or when every sender is dropped.
pub struct ChannelSource<P> {
    receiver: Mutex<Option<mpsc::Receiver<Message<P>>>>,
}

impl<P: Payload> ChannelSource<P> {
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Message<P>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let source = Self {
            receiver: Mutex::new(Some(receiver)),
        };
        (source, sender)
    }
}

#[async_trait]
impl<P: Payload> MessageSource<P> for ChannelSource<P> {
    async fn start(
        &self,
        handler: Arc<dyn MessageHandler<P>>,
        cancel: CancellationToken,
    ) -> events::Result<()> {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            return Err(Error::new(ErrorKind::Source(SourceErrorKind::AlreadyStarted)));
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                message = receiver.recv() => message,
            };
            let Some(message) = next else {
                break;
            };

            let message_id = message.id().to_string();
            if let Err(e) = handler.handle(message).await {
                warn!("Message {message_id} was not delivered to the hub: {e}");
            }
        }

        debug!("Channel source finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}
