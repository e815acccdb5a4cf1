//! Error types shared by message sources and handlers.
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Error returned by a `MessageSource` or a `MessageHandler`.
///
/// Follows the same layout as the other crates in the workspace: a root struct
/// holding an `error_kind` tree and the optional underlying cause.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The operation stopped because its cancellation token fired. Never a failure.
    Cancelled,
    /// A handler could not pass a message on.
    Handler,
    Source(SourceErrorKind),
}

/// Failures reported by a message source itself.
#[derive(Debug, PartialEq)]
pub enum SourceErrorKind {
    /// The upstream connection (broker, socket, channel) is gone.
    Connection,
    /// The source was already started and cannot be started again.
    AlreadyStarted,
    /// An upstream record could not be turned into a message.
    Decode,
    Other(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source<E>(error_kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    pub fn handler<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::with_source(ErrorKind::Handler, source)
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_kind == ErrorKind::Cancelled
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{:?}: {source}", self.error_kind),
            None => write!(f, "{:?}", self.error_kind),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_recognised() {
        assert!(Error::cancelled().is_cancelled());
        assert!(!Error::new(ErrorKind::Source(SourceErrorKind::Connection)).is_cancelled());
    }

    #[test]
    fn test_display_includes_source() {
        let err = Error::handler("hub is shut down");
        assert_eq!(err.to_string(), "Handler: hub is shut down");
        assert!(StdError::source(&err).is_some());
    }
}
