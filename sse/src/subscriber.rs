use events::{Message, Payload};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a subscriber (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one enqueue attempt on a subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Sent,
    /// The write timed out; carries the consecutive failure count after this attempt.
    TimedOut(u32),
    /// The queue was closed before or during the attempt.
    Closed,
}

/// Writer side of one subscriber's bounded queue.
///
/// Many broadcasts may write concurrently; the matching receiver is owned by a
/// single `Subscription`.
pub(crate) struct Subscriber<P> {
    sender: mpsc::Sender<Arc<Message<P>>>,
    closed: CancellationToken,
    failed_deliveries: AtomicU32,
}

impl<P: Payload> Subscriber<P> {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<Message<P>>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let subscriber = Self {
            sender,
            closed: CancellationToken::new(),
            failed_deliveries: AtomicU32::new(0),
        };
        (subscriber, receiver)
    }

    /// Marks the queue complete. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.sender.is_closed()
    }

    /// Token that fires when the queue is closed.
    pub(crate) fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn failed_deliveries(&self) -> u32 {
        self.failed_deliveries.load(Ordering::Acquire)
    }

    /// Enqueue, waiting as long as it takes for space or for the queue to close.
    pub(crate) async fn send_waiting(&self, message: Arc<Message<P>>) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => SendOutcome::Closed,
            sent = self.sender.send(message) => match sent {
                Ok(()) => self.delivered(),
                Err(_) => SendOutcome::Closed,
            },
        }
    }

    /// Enqueue, giving up after `timeout`. A give-up bumps the failure counter.
    pub(crate) async fn send_within(
        &self,
        message: Arc<Message<P>>,
        timeout: Duration,
    ) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => SendOutcome::Closed,
            sent = tokio::time::timeout(timeout, self.sender.send(message)) => match sent {
                Ok(Ok(())) => self.delivered(),
                Ok(Err(_)) => SendOutcome::Closed,
                Err(_) => {
                    let failures = self.failed_deliveries.fetch_add(1, Ordering::AcqRel) + 1;
                    SendOutcome::TimedOut(failures)
                }
            },
        }
    }

    fn delivered(&self) -> SendOutcome {
        self.failed_deliveries.store(0, Ordering::Release);
        SendOutcome::Sent
    }
}
