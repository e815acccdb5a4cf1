use crate::error::{Error, HubErrorKind, Result};
use crate::options::{Options, SlowConsumerStrategy, DISCONNECT_THRESHOLD};
use crate::registry::SubscriberRegistry;
use crate::subscriber::{SendOutcome, Subscriber, SubscriberId};
use crate::subscription::Subscription;
use events::{Message, Payload};
use futures::future::join_all;
use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of delivering one message to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Timed out; the message is lost for this subscriber only.
    Dropped,
    /// Timed out once too often; the subscriber was removed.
    Disconnected,
    /// The queue closed before the message could be written.
    Closed,
}

/// Per-subscriber outcomes of a single broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub disconnected: usize,
    pub closed: usize,
    /// Delivery attempts that failed unexpectedly (e.g. a panicked delivery task).
    pub failed: usize,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.dropped + self.disconnected + self.closed + self.failed
    }

    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Dropped => self.dropped += 1,
            Delivery::Disconnected => self.disconnected += 1,
            Delivery::Closed => self.closed += 1,
        }
    }
}

/// Fans every broadcast message out to all current subscribers, each through
/// its own bounded queue, applying the configured slow-consumer strategy.
pub struct MessageHub<P: Payload> {
    registry: Arc<SubscriberRegistry<P>>,
    options: Options,
    shut_down: AtomicBool,
}

impl<P: Payload> MessageHub<P> {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;

        debug!(
            "Message hub configured: channel_capacity={}, write_timeout={:?}, slow_consumer_strategy={}",
            options.channel_capacity, options.write_timeout, options.slow_consumer_strategy
        );

        Ok(Self {
            registry: Arc::new(SubscriberRegistry::new()),
            options,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Register a new subscriber and return the stream of messages it receives.
    ///
    /// The subscriber is registered before this returns, so broadcasts issued
    /// afterwards reach it even if the stream has not been polled yet. Firing
    /// `cancel` removes it right away. Must be called within a tokio runtime.
    pub fn subscribe(&self, cancel: CancellationToken) -> Subscription<P> {
        let (id, subscriber, receiver) = self.registry.register(self.options.channel_capacity);
        let closed = subscriber.closed_token();
        drop(subscriber);

        if self.is_shut_down() {
            debug!("Hub is shut down, subscriber {id} closed on arrival");
            self.registry.unregister(&id);
        } else {
            debug!(
                "Registered subscriber {id} ({} active)",
                self.registry.len()
            );
        }

        Subscription::new(id, Arc::clone(&self.registry), receiver, closed, cancel)
    }

    /// Deliver `message` to every current subscriber.
    ///
    /// Deliveries run concurrently and independently: a slow or failing
    /// subscriber never delays or fails delivery to the others. Returns once
    /// every attempt has resolved.
    pub async fn broadcast(&self, message: Message<P>) -> Result<BroadcastReport> {
        if self.is_shut_down() {
            return Err(Error::hub(HubErrorKind::ShutDown));
        }

        let mut report = BroadcastReport::default();
        if self.registry.is_empty() {
            trace!("No subscribers, skipping message {}", message.id());
            return Ok(report);
        }

        let message = Arc::new(message);
        let attempts: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|(id, subscriber)| {
                let delivery = deliver(
                    Arc::clone(&self.registry),
                    id,
                    subscriber,
                    Arc::clone(&message),
                    self.options.clone(),
                );
                (id, tokio::spawn(delivery))
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = attempts.into_iter().unzip();
        for (id, outcome) in ids.into_iter().zip(join_all(handles).await) {
            match outcome {
                Ok(delivery) => report.record(delivery),
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "Error writing to subscriber {id}. Message: Id={}, Error={e}",
                        message.id()
                    );
                }
            }
        }

        trace!("Broadcast of message {} finished: {report:?}", message.id());
        Ok(report)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_subscribed(&self, id: &SubscriberId) -> bool {
        self.registry.contains(id)
    }

    /// Consecutive failed deliveries of an active subscriber.
    pub fn failed_deliveries(&self, id: &SubscriberId) -> Option<u32> {
        self.registry
            .get(id)
            .map(|subscriber| subscriber.failed_deliveries())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close every subscriber queue and refuse further broadcasts.
    /// Messages already queued are still handed to their readers.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let closed = self.registry.close_all();
        info!("Message hub shut down, {closed} subscriber(s) closed");
    }
}

async fn deliver<P: Payload>(
    registry: Arc<SubscriberRegistry<P>>,
    id: SubscriberId,
    subscriber: Arc<Subscriber<P>>,
    message: Arc<Message<P>>,
    options: Options,
) -> Delivery {
    let message_id = message.id().to_string();

    let outcome = match options.slow_consumer_strategy {
        SlowConsumerStrategy::Wait => subscriber.send_waiting(message).await,
        SlowConsumerStrategy::DropMessages | SlowConsumerStrategy::DisconnectSubscriber => {
            subscriber.send_within(message, options.write_timeout).await
        }
    };

    match outcome {
        SendOutcome::Sent => Delivery::Delivered,
        SendOutcome::Closed => {
            debug!("Subscriber {id} closed before message {message_id} could be written");
            Delivery::Closed
        }
        SendOutcome::TimedOut(failures) => {
            if options.slow_consumer_strategy == SlowConsumerStrategy::DisconnectSubscriber
                && failures >= DISCONNECT_THRESHOLD
            {
                if registry.unregister(&id) {
                    warn!(
                        "Disconnecting subscriber {id} after {failures} consecutive failed deliveries"
                    );
                    Delivery::Disconnected
                } else {
                    // Already removed by a concurrent delivery, cancel or shutdown.
                    Delivery::Closed
                }
            } else {
                warn!(
                    "Dropped message {message_id} for slow subscriber {id} ({failures} consecutive failed deliveries)"
                );
                Delivery::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

    fn hub(capacity: usize, strategy: SlowConsumerStrategy) -> MessageHub<String> {
        MessageHub::new(
            Options::default()
                .with_channel_capacity(capacity)
                .with_write_timeout(WRITE_TIMEOUT)
                .with_slow_consumer_strategy(strategy),
        )
        .unwrap()
    }

    fn message(id: &str) -> Message<String> {
        Message::with_id(id, format!("payload {id}"))
    }

    async fn next_id(subscription: &mut Subscription<String>) -> Option<String> {
        timeout(Duration::from_secs(1), subscription.next())
            .await
            .expect("timed out waiting for a message")
            .map(|message| message.id().to_string())
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(1), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        assert!(MessageHub::<String>::new(Options::default().with_channel_capacity(0)).is_err());
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_noop() {
        let hub = hub(1, SlowConsumerStrategy::Wait);

        let report = timeout(Duration::from_millis(100), hub.broadcast(message("a")))
            .await
            .expect("broadcast blocked")
            .unwrap();

        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_wait_delivers_everything_in_order() {
        let hub = Arc::new(hub(2, SlowConsumerStrategy::Wait));
        let ids: Vec<String> = (0..20).map(|n| n.to_string()).collect();

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let mut subscription = hub.subscribe(CancellationToken::new());
                let count = ids.len();
                tokio::spawn(async move {
                    let mut received = Vec::new();
                    while received.len() < count {
                        match subscription.next().await {
                            Some(message) => received.push(message.id().to_string()),
                            None => break,
                        }
                    }
                    received
                })
            })
            .collect();

        for id in &ids {
            let report = hub.broadcast(message(id)).await.unwrap();
            assert_eq!(report.delivered, 3);
        }

        for reader in readers {
            assert_eq!(reader.await.unwrap(), ids);
        }
    }

    #[tokio::test]
    async fn test_drop_messages_loses_message_only_for_full_subscriber() {
        let hub = hub(1, SlowConsumerStrategy::DropMessages);
        let mut stalled = hub.subscribe(CancellationToken::new());
        let mut draining = hub.subscribe(CancellationToken::new());

        hub.broadcast(message("a")).await.unwrap();
        assert_eq!(next_id(&mut draining).await.as_deref(), Some("a"));

        let report = hub.broadcast(message("b")).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(next_id(&mut draining).await.as_deref(), Some("b"));

        assert_eq!(next_id(&mut stalled).await.as_deref(), Some("a"));
        hub.broadcast(message("c")).await.unwrap();
        assert_eq!(next_id(&mut stalled).await.as_deref(), Some("c"));
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_drop_messages_end_to_end_counts_one_failure() {
        let hub = hub(1, SlowConsumerStrategy::DropMessages);
        let subscription = hub.subscribe(CancellationToken::new());
        let id = subscription.id();

        let first = hub.broadcast(message("a")).await.unwrap();
        let second = hub.broadcast(message("b")).await.unwrap();

        assert_eq!(first.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(hub.failed_deliveries(&id), Some(1));
        assert!(hub.is_subscribed(&id));
    }

    #[tokio::test]
    async fn test_successful_delivery_resets_failure_counter() {
        let hub = hub(1, SlowConsumerStrategy::DropMessages);
        let mut subscription = hub.subscribe(CancellationToken::new());
        let id = subscription.id();

        hub.broadcast(message("a")).await.unwrap();
        hub.broadcast(message("b")).await.unwrap();
        hub.broadcast(message("c")).await.unwrap();
        assert_eq!(hub.failed_deliveries(&id), Some(2));

        assert_eq!(next_id(&mut subscription).await.as_deref(), Some("a"));
        let report = hub.broadcast(message("d")).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(hub.failed_deliveries(&id), Some(0));
        assert_eq!(next_id(&mut subscription).await.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn test_disconnect_after_three_consecutive_timeouts() {
        let hub = hub(1, SlowConsumerStrategy::DisconnectSubscriber);
        let mut stalled = hub.subscribe(CancellationToken::new());
        let mut healthy = hub.subscribe(CancellationToken::new());
        let stalled_id = stalled.id();

        // Fill the stalled subscriber's queue.
        hub.broadcast(message("fill")).await.unwrap();
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("fill"));

        for (n, id) in ["x", "y"].iter().enumerate() {
            let report = hub.broadcast(message(id)).await.unwrap();
            assert_eq!(report.dropped, 1);
            assert_eq!(hub.failed_deliveries(&stalled_id), Some(n as u32 + 1));
            assert_eq!(next_id(&mut healthy).await.as_deref(), Some(*id));
        }

        let report = hub.broadcast(message("z")).await.unwrap();
        assert_eq!(report.disconnected, 1);
        assert_eq!(report.delivered, 1);
        assert!(!hub.is_subscribed(&stalled_id));
        assert_eq!(hub.subscriber_count(), 1);

        // The disconnected reader drains what was queued, then ends.
        assert_eq!(next_id(&mut stalled).await.as_deref(), Some("fill"));
        assert_eq!(next_id(&mut stalled).await, None);

        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("z"));
        let report = hub.broadcast(message("after")).await.unwrap();
        assert_eq!(report.attempted(), 1);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_cancelling_one_subscriber_leaves_others_untouched() {
        let hub = hub(4, SlowConsumerStrategy::Wait);
        let cancel = CancellationToken::new();
        let mut cancelled = hub.subscribe(cancel.clone());
        let mut kept = hub.subscribe(CancellationToken::new());
        let cancelled_id = cancelled.id();
        let kept_id = kept.id();

        cancel.cancel();
        wait_until(|| hub.subscriber_count() == 1).await;
        assert!(!hub.is_subscribed(&cancelled_id));
        assert!(hub.is_subscribed(&kept_id));

        let report = hub.broadcast(message("a")).await.unwrap();
        assert_eq!(report.attempted(), 1);
        assert_eq!(next_id(&mut kept).await.as_deref(), Some("a"));
        assert_eq!(next_id(&mut cancelled).await, None);
    }

    #[tokio::test]
    async fn test_cancel_releases_waiting_broadcast() {
        let hub = Arc::new(hub(1, SlowConsumerStrategy::Wait));
        let cancel = CancellationToken::new();
        let _stalled = hub.subscribe(cancel.clone());

        hub.broadcast(message("a")).await.unwrap();
        let pending = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.broadcast(message("b")).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!pending.is_finished());

        cancel.cancel();
        let report = timeout(Duration::from_secs(1), pending)
            .await
            .expect("broadcast still blocked after cancellation")
            .unwrap()
            .unwrap();
        assert_eq!(report.closed, 1);
    }

    #[tokio::test]
    async fn test_cancel_during_broadcast_leaves_other_subscribers_untouched() {
        let hub = Arc::new(hub(1, SlowConsumerStrategy::Wait));
        let cancel = CancellationToken::new();
        let _stalled = hub.subscribe(cancel.clone());
        let mut healthy = hub.subscribe(CancellationToken::new());

        hub.broadcast(message("a")).await.unwrap();
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("a"));

        let pending = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.broadcast(message("b")).await })
        };
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("b"));
        assert!(!pending.is_finished());

        cancel.cancel();
        let report = timeout(Duration::from_secs(1), pending)
            .await
            .expect("broadcast still blocked after cancellation")
            .unwrap()
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.closed, 1);
        assert_eq!(report.attempted(), 2);
        assert_eq!(hub.subscriber_count(), 1);

        hub.broadcast(message("c")).await.unwrap();
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_concurrent_timeouts_disconnect_only_once() {
        let hub = hub(1, SlowConsumerStrategy::DisconnectSubscriber);
        let _slow = hub.subscribe(CancellationToken::new());
        hub.broadcast(message("fill")).await.unwrap();

        let (r1, r2, r3, r4) = tokio::join!(
            hub.broadcast(message("1")),
            hub.broadcast(message("2")),
            hub.broadcast(message("3")),
            hub.broadcast(message("4")),
        );
        let reports = [r1.unwrap(), r2.unwrap(), r3.unwrap(), r4.unwrap()];
        let total = |field: fn(&BroadcastReport) -> usize| reports.iter().map(field).sum::<usize>();

        assert_eq!(total(|r| r.disconnected), 1);
        assert_eq!(total(|r| r.dropped), 2);
        assert_eq!(total(|r| r.closed), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_stalled_subscriber_does_not_block_others() {
        let hub = Arc::new(hub(1, SlowConsumerStrategy::Wait));
        let _stalled = hub.subscribe(CancellationToken::new());
        let mut healthy = hub.subscribe(CancellationToken::new());

        hub.broadcast(message("a")).await.unwrap();
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("a"));

        let pending = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.broadcast(message("b")).await })
        };

        // The healthy subscriber gets "b" while the broadcast is still stuck on the stalled one.
        assert_eq!(next_id(&mut healthy).await.as_deref(), Some("b"));
        assert!(!pending.is_finished());
        pending.abort();
    }

    #[tokio::test]
    async fn test_dropping_subscription_unregisters() {
        let hub = hub(4, SlowConsumerStrategy::DropMessages);
        let subscription = hub.subscribe(CancellationToken::new());
        assert_eq!(hub.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers_and_rejects_broadcasts() {
        let hub = hub(4, SlowConsumerStrategy::DropMessages);
        let mut subscription = hub.subscribe(CancellationToken::new());
        hub.broadcast(message("a")).await.unwrap();

        hub.shutdown();
        hub.shutdown();

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(next_id(&mut subscription).await.as_deref(), Some("a"));
        assert_eq!(next_id(&mut subscription).await, None);

        let err = hub.broadcast(message("b")).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::SseErrorKind::Hub(HubErrorKind::ShutDown)
        );

        let mut late = hub.subscribe(CancellationToken::new());
        assert_eq!(next_id(&mut late).await, None);
    }
}
