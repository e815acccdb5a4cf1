use crate::subscriber::{Subscriber, SubscriberId};
use dashmap::DashMap;
use events::{Message, Payload};
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Concurrent registry of active subscribers.
///
/// Every entry owns an open queue: removing an entry closes its queue, and a
/// queue is only ever closed by removing its entry.
pub(crate) struct SubscriberRegistry<P> {
    subscribers: DashMap<SubscriberId, Arc<Subscriber<P>>>,
}

impl<P: Payload> SubscriberRegistry<P> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a new subscriber with a queue of `capacity` - O(1)
    pub(crate) fn register(
        &self,
        capacity: usize,
    ) -> (SubscriberId, Arc<Subscriber<P>>, mpsc::Receiver<Arc<Message<P>>>) {
        let id = SubscriberId::new();
        let (subscriber, receiver) = Subscriber::new(capacity);
        let subscriber = Arc::new(subscriber);

        self.subscribers.insert(id, Arc::clone(&subscriber));

        (id, subscriber, receiver)
    }

    /// Remove a subscriber and close its queue - O(1)
    ///
    /// Returns `false` if it was already gone, so concurrent callers can tell
    /// which of them actually removed it.
    pub(crate) fn unregister(&self, id: &SubscriberId) -> bool {
        match self.subscribers.remove(id) {
            Some((_, subscriber)) => {
                subscriber.close();
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the registry. No map guard outlives this call, so
    /// callers may await while holding the result.
    pub(crate) fn snapshot(&self) -> Vec<(SubscriberId, Arc<Subscriber<P>>)> {
        self.subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    pub(crate) fn get(&self, id: &SubscriberId) -> Option<Arc<Subscriber<P>>> {
        self.subscribers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Remove and close every subscriber, returning how many there were.
    pub(crate) fn close_all(&self) -> usize {
        let ids: Vec<SubscriberId> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        let closed = ids.iter().filter(|id| self.unregister(id)).count();
        debug!("Closed {closed} subscriber queue(s)");
        closed
    }
}
