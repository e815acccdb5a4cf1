//! Server-Sent Events (SSE) broadcast hub.
//!
//! This crate fans messages produced by a single source out to any number of
//! concurrently connected subscribers, each behind its own bounded queue.
//!
//! # Architecture
//!
//! - **Per-subscriber queues**: every subscriber gets a bounded channel of
//!   `channel_capacity` messages. Many broadcasts may write to it at once, a
//!   single `Subscription` stream reads from it.
//! - **Concurrent registry**: subscribers live in a `DashMap`. Broadcasts
//!   iterate a snapshot, so subscribing and unsubscribing never wait on a
//!   broadcast in flight.
//! - **Independent deliveries**: each message is written to each subscriber in
//!   its own task. A slow or broken subscriber cannot hold up the others.
//! - **Slow-consumer strategies**: `Wait` for space, `DropMessages` after the
//!   write timeout, or `DisconnectSubscriber` after three consecutive timeouts.
//! - **Ephemeral messages**: nothing is persisted. A subscriber that is not
//!   connected misses what is broadcast meanwhile.
//!
//! # Message Flow
//!
//! 1. `IngestionService::start` runs the configured `MessageSource`
//! 2. The source hands every message to the service's forwarding handler
//! 3. `MessageHub::broadcast` writes the message to every registered queue
//! 4. Each `Subscription` yields the messages of its queue in order
//! 5. Cancelling a subscription's token, or dropping it, removes the subscriber
//!
//! # Example
//!
//! ```rust,ignore
//! use sse::{ChannelSource, IngestionService, MessageHub, Options};
//!
//! let hub = Arc::new(MessageHub::new(Options::default())?);
//! let (source, sender) = ChannelSource::new(64);
//! let ingestion = IngestionService::new(Arc::new(source), Arc::clone(&hub));
//! ingestion.start().await?;
//!
//! let mut subscription = hub.subscribe(CancellationToken::new());
//! sender.send(Message::new(json!({"text": "hello"}))).await?;
//! let message = subscription.next().await;
//! ```
//!
//! # Modules
//!
//! - `hub`: fan-out and slow-consumer handling
//! - `ingestion`: supervised bridge from a message source into the hub
//! - `options`: hub configuration
//! - `source`: channel-fed message source

pub mod error;
pub mod hub;
pub mod ingestion;
pub mod options;
pub mod source;
pub mod subscription;

mod registry;
mod subscriber;

pub use error::{Error, Result};
pub use hub::{BroadcastReport, MessageHub};
pub use ingestion::{IngestionService, IngestionState, IngestionStats};
pub use options::{Options, SlowConsumerStrategy};
pub use source::ChannelSource;
pub use subscriber::SubscriberId;
pub use subscription::Subscription;
