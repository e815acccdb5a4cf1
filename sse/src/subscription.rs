use crate::registry::SubscriberRegistry;
use crate::subscriber::SubscriberId;
use async_stream::stream;
use events::{Message, Payload};
use futures::Stream;
use log::*;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type MessageStream<P> = Pin<Box<dyn Stream<Item = Arc<Message<P>>> + Send>>;

/// Reader side of one subscriber's queue.
///
/// Yields messages in broadcast order until the cancellation token passed to
/// `MessageHub::subscribe` fires or the hub closes the queue. Messages already
/// queued when the hub closes the queue are still yielded; cancellation stops
/// immediately. Dropping a subscription unregisters it.
pub struct Subscription<P: Payload> {
    id: SubscriberId,
    inner: MessageStream<P>,
}

impl<P: Payload> Subscription<P> {
    pub(crate) fn new(
        id: SubscriberId,
        registry: Arc<SubscriberRegistry<P>>,
        mut receiver: mpsc::Receiver<Arc<Message<P>>>,
        closed: CancellationToken,
        cancel: CancellationToken,
    ) -> Self {
        // Teardown must not wait for the reader to be polled.
        tokio::spawn(watch_cancellation(
            id,
            Arc::clone(&registry),
            cancel.clone(),
            closed.clone(),
        ));

        let guard = UnregisterOnDrop { id, registry };
        let inner = stream! {
            let _guard = guard;
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    message = receiver.recv() => message,
                    _ = closed.cancelled() => None,
                };
                match next {
                    Some(message) => yield message,
                    None => break,
                }
            }
            debug!("Subscription {id} finished");
        };

        Self {
            id,
            inner: Box::pin(inner),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl<P: Payload> Stream for Subscription<P> {
    type Item = Arc<Message<P>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

async fn watch_cancellation<P: Payload>(
    id: SubscriberId,
    registry: Arc<SubscriberRegistry<P>>,
    cancel: CancellationToken,
    closed: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            if registry.unregister(&id) {
                debug!("Subscriber {id} cancelled, removed from registry");
            }
        }
        _ = closed.cancelled() => {}
    }
}

struct UnregisterOnDrop<P: Payload> {
    id: SubscriberId,
    registry: Arc<SubscriberRegistry<P>>,
}

impl<P: Payload> Drop for UnregisterOnDrop<P> {
    fn drop(&mut self) {
        if self.registry.unregister(&self.id) {
            debug!("Subscriber {} dropped, removed from registry", self.id);
        }
    }
}
