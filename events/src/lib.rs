//! Message model and producer contracts for the notification hub.
//!
//! This crate has no dependencies on the other workspace crates, so message
//! sources can be written without pulling in the hub or the web layer.
//!
//! # Architecture
//!
//! - **Message**: immutable unit of data broadcast to every subscriber
//! - **MessageHandler**: receives each message a source produces
//! - **MessageSource**: external producer driven by the ingestion loop

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod error;

pub use error::{Error, ErrorKind, Result, SourceErrorKind};

/// Metadata key carrying the event type of a message. The SSE layer uses it
/// for the `event:` field of the record.
pub const EVENT_TYPE_KEY: &str = "event";

/// Bound shared by every payload type the hub can carry.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}

/// A single message produced by a source and fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<P> {
    id: String,
    payload: P,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl<P> Message<P> {
    /// Creates a message with a freshly generated id.
    pub fn new(payload: P) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), payload)
    }

    pub fn with_id(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_event_type(self, event_type: impl Into<String>) -> Self {
        self.with_metadata(EVENT_TYPE_KEY, event_type)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// The routing hint stored under [`EVENT_TYPE_KEY`], if any.
    pub fn event_type(&self) -> Option<&str> {
        self.metadata.get(EVENT_TYPE_KEY).map(String::as_str)
    }
}

/// Receives the messages a source produces.
#[async_trait]
pub trait MessageHandler<P: Payload>: Send + Sync {
    async fn handle(&self, message: Message<P>) -> Result<()>;
}

/// An external producer of messages.
///
/// `start` runs for the whole life of the source: it calls `handler` once per
/// produced message and must return promptly, normally or with an error, after
/// `cancel` fires. A handler error concerns one message only; sources are
/// expected to log it and keep producing.
#[async_trait]
pub trait MessageSource<P: Payload>: Send + Sync {
    async fn start(&self, handler: Arc<dyn MessageHandler<P>>, cancel: CancellationToken)
        -> Result<()>;

    /// Name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
