use crate::error::{ConfigErrorKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 200;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Consecutive timed-out deliveries after which `DisconnectSubscriber` drops a subscriber.
pub const DISCONNECT_THRESHOLD: u32 = 3;

/// What the hub does when a subscriber's queue is full at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlowConsumerStrategy {
    /// Give up on the message for that subscriber after the write timeout.
    #[default]
    DropMessages,
    /// Like `DropMessages`, but remove the subscriber after repeated timeouts.
    DisconnectSubscriber,
    /// Wait for space in the queue. One stalled subscriber holds up the broadcast call.
    Wait,
}

impl SlowConsumerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlowConsumerStrategy::DropMessages => "drop_messages",
            SlowConsumerStrategy::DisconnectSubscriber => "disconnect_subscriber",
            SlowConsumerStrategy::Wait => "wait",
        }
    }
}

impl FromStr for SlowConsumerStrategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().replace('-', "_").as_str() {
            "drop_messages" | "dropmessages" => Ok(SlowConsumerStrategy::DropMessages),
            "disconnect_subscriber" | "disconnectsubscriber" => {
                Ok(SlowConsumerStrategy::DisconnectSubscriber)
            }
            "wait" => Ok(SlowConsumerStrategy::Wait),
            _ => Err(Error::config(ConfigErrorKind::UnknownStrategy(
                value.to_string(),
            ))),
        }
    }
}

impl fmt::Display for SlowConsumerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hub configuration. Fixed for the lifetime of a hub.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Maximum number of queued messages per subscriber.
    pub channel_capacity: usize,
    /// How long a non-waiting delivery may take before it counts as failed.
    pub write_timeout: Duration,
    pub slow_consumer_strategy: SlowConsumerStrategy,
}

impl Options {
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_slow_consumer_strategy(mut self, strategy: SlowConsumerStrategy) -> Self {
        self.slow_consumer_strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::config(ConfigErrorKind::ZeroChannelCapacity));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::config(ConfigErrorKind::ZeroWriteTimeout));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            slow_consumer_strategy: SlowConsumerStrategy::default(),
        }
    }
}
