use crate::error::{Error, IngestionErrorKind, Result};
use crate::hub::MessageHub;
use async_trait::async_trait;
use events::{Message, MessageHandler, MessageSource, Payload};
use log::*;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of an ingestion loop.
///
/// `Stopped -> Starting -> Running -> (Cancelling -> Stopped) | Faulted`.
/// Once a loop has run, both `Stopped` and `Faulted` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    Stopped,
    Starting,
    Running,
    Cancelling,
    Faulted,
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match self {
            IngestionState::Stopped => "stopped",
            IngestionState::Starting => "starting",
            IngestionState::Running => "running",
            IngestionState::Cancelling => "cancelling",
            IngestionState::Faulted => "faulted",
        };
        write!(f, "{state}")
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    /// Messages successfully handed to the hub.
    pub processed: u64,
    /// Messages the hub refused.
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> IngestionStats {
        IngestionStats {
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Handler given to the source: forwards every message to the hub.
struct HubForwarder<P: Payload> {
    hub: Arc<MessageHub<P>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl<P: Payload> MessageHandler<P> for HubForwarder<P> {
    async fn handle(&self, message: Message<P>) -> events::Result<()> {
        let message_id = message.id().to_string();

        match self.hub.broadcast(message).await {
            Ok(report) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                trace!("Message {message_id} broadcast: {report:?}");
                Ok(())
            }
            Err(e) => {
                // Contained here: a refused message never ends the source.
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                error!("Error broadcasting message: {message_id}: {e}");
                Ok(())
            }
        }
    }
}

/// Long-running task that bridges one message source into a hub.
pub struct IngestionService<P: Payload> {
    source: Arc<dyn MessageSource<P>>,
    hub: Arc<MessageHub<P>>,
    counters: Arc<Counters>,
    state: Arc<watch::Sender<IngestionState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
    shutdown_grace: Duration,
}

impl<P: Payload> IngestionService<P> {
    pub fn new(source: Arc<dyn MessageSource<P>>, hub: Arc<MessageHub<P>>) -> Self {
        let (state, _) = watch::channel(IngestionState::Stopped);
        Self {
            source,
            hub,
            counters: Arc::new(Counters::default()),
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// How long `stop` waits for the source to wind down.
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn state(&self) -> IngestionState {
        *self.state.borrow()
    }

    /// Watch state transitions, e.g. to crash the host when the loop faults.
    pub fn watch_state(&self) -> watch::Receiver<IngestionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> IngestionStats {
        self.counters.snapshot()
    }

    /// Spawn the ingestion task. An instance can only be started once.
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() || self.cancel.is_cancelled() {
            return Err(Error::ingestion(IngestionErrorKind::AlreadyStarted));
        }

        self.state.send_replace(IngestionState::Starting);
        info!("Starting message source '{}'", self.source.name());

        let handler: Arc<dyn MessageHandler<P>> = Arc::new(HubForwarder {
            hub: Arc::clone(&self.hub),
            counters: Arc::clone(&self.counters),
        });

        *task = Some(tokio::spawn(run(
            Arc::clone(&self.source),
            handler,
            self.cancel.clone(),
            Arc::clone(&self.counters),
            Arc::clone(&self.state),
        )));
        Ok(())
    }

    /// Cancel the source and wait, at most for the shutdown grace period, for
    /// it to stop. Returns the fatal error if the source had faulted.
    pub async fn stop(&self) -> Result<()> {
        let Some(handle) = self.task.lock().await.take() else {
            self.cancel.cancel();
            return Ok(());
        };

        self.state.send_if_modified(|state| {
            if matches!(state, IngestionState::Starting | IngestionState::Running) {
                *state = IngestionState::Cancelling;
                true
            } else {
                false
            }
        });
        self.cancel.cancel();

        match tokio::time::timeout(self.shutdown_grace, handle).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                warn!(
                    "Message source '{}' did not stop within {:?}",
                    self.source.name(),
                    self.shutdown_grace
                );
                Err(Error::ingestion(IngestionErrorKind::ShutdownTimedOut))
            }
        }
    }

    /// Wait for the ingestion task to finish on its own.
    pub async fn join(&self) -> Result<()> {
        let handle = self.task.lock().await.take();
        match handle {
            Some(handle) => flatten(handle.await),
            None => Ok(()),
        }
    }
}

impl<P: Payload> Drop for IngestionService<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn flatten(joined: core::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!("Ingestion task panicked: {e}");
            Err(Error {
                source: Some(Box::new(e)),
                error_kind: crate::error::SseErrorKind::Ingestion(IngestionErrorKind::Panicked),
            })
        }
    }
}

async fn run<P: Payload>(
    source: Arc<dyn MessageSource<P>>,
    handler: Arc<dyn MessageHandler<P>>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    state: Arc<watch::Sender<IngestionState>>,
) -> Result<()> {
    state.send_if_modified(|state| {
        if *state == IngestionState::Starting {
            *state = IngestionState::Running;
            true
        } else {
            false
        }
    });

    let outcome = source.start(handler, cancel).await;
    let stats = counters.snapshot();

    match outcome {
        Err(e) if !e.is_cancelled() => {
            error!(
                "Fatal error in message source '{}' after processing {} messages: {e}",
                source.name(),
                stats.processed
            );
            state.send_replace(IngestionState::Faulted);
            Err(e.into())
        }
        _ => {
            info!(
                "Message source '{}' stopped. Messages processed: {}, Errors: {}",
                source.name(),
                stats.processed,
                stats.errors
            );
            state.send_replace(IngestionState::Stopped);
            Ok(())
        }
    }
}
