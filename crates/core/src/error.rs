use std::borrow::Cow;
use std::fmt::{self, Display};

use buddy_model::{ErrorKind as ModelErrorKind, ModelProviderError};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input was rejected before anything happened, e.g. an empty
    /// message.
    Validation,
    /// Another generation is still running for this conversation.
    Busy,
    /// The model provider is not configured.
    Configuration,
    /// The endpoint rejected the request or could not be reached. No
    /// output was produced.
    Transport,
    /// The response broke after streaming had begun.
    StreamInterrupted,
    /// The generation was cancelled by the caller.
    Cancelled,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "Invalid input"),
            ErrorKind::Busy => write!(f, "A reply is still being generated"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::Transport => write!(f, "Request failed"),
            ErrorKind::StreamInterrupted => write!(f, "Response interrupted"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Describes why a conversation operation failed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    status: Option<u16>,
}

impl Error {
    #[inline]
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            status: None,
        }
    }

    /// Creates a new error with the `Validation` kind.
    #[inline]
    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Self::with_kind(ErrorKind::Validation).with_reason(reason)
    }

    /// Creates a new error with the `Busy` kind.
    #[inline]
    pub fn busy() -> Self {
        Self::with_kind(ErrorKind::Busy)
    }

    /// Creates a new error with the `Cancelled` kind.
    #[inline]
    pub fn cancelled() -> Self {
        Self::with_kind(ErrorKind::Cancelled)
    }

    /// Converts an error reported by a model provider.
    pub fn from_provider(err: &dyn ModelProviderError) -> Self {
        let kind = match err.kind() {
            ModelErrorKind::Configuration => ErrorKind::Configuration,
            ModelErrorKind::StreamInterrupted => ErrorKind::StreamInterrupted,
            ModelErrorKind::Transport | ModelErrorKind::Other => {
                ErrorKind::Transport
            }
        };
        Self {
            kind,
            reason: Some(err.to_string()),
            status: err.status(),
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the status code reported by the endpoint, if any.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}
