//! Error types for the `sse` crate.
//!
//! Same pattern as `events::error`: a root `Error` struct holding an
//! `error_kind` tree and the optional cause.
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: SseErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum SseErrorKind {
    Config(ConfigErrorKind),
    Hub(HubErrorKind),
    Ingestion(IngestionErrorKind),
}

/// Invalid hub options.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    ZeroChannelCapacity,
    ZeroWriteTimeout,
    UnknownStrategy(String),
}

#[derive(Debug, PartialEq)]
pub enum HubErrorKind {
    /// The hub was shut down and accepts no further broadcasts.
    ShutDown,
}

#[derive(Debug, PartialEq)]
pub enum IngestionErrorKind {
    AlreadyStarted,
    /// The message source exited with an error other than cancellation.
    SourceFailed,
    /// The ingestion task panicked.
    Panicked,
    /// The source did not stop within the shutdown grace period.
    ShutdownTimedOut,
}

impl Error {
    pub fn new(error_kind: SseErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub(crate) fn config(kind: ConfigErrorKind) -> Self {
        Self::new(SseErrorKind::Config(kind))
    }

    pub(crate) fn hub(kind: HubErrorKind) -> Self {
        Self::new(SseErrorKind::Hub(kind))
    }

    pub(crate) fn ingestion(kind: IngestionErrorKind) -> Self {
        Self::new(SseErrorKind::Ingestion(kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "SSE Error: {:?} ({source})", self.error_kind),
            None => write!(f, "SSE Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// A failing message source surfaces from the ingestion loop as `SourceFailed`.
impl From<events::Error> for Error {
    fn from(err: events::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: SseErrorKind::Ingestion(IngestionErrorKind::SourceFailed),
        }
    }
}
