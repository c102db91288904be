use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider is missing a required setting (e.g. the API key).
    ///
    /// Errors of this kind are raised before any network activity.
    Configuration,
    /// The endpoint refused the request or could not be reached. No
    /// output has been produced.
    Transport,
    /// The response failed after streaming has begun. Fragments that were
    /// delivered before the failure are still valid.
    StreamInterrupted,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::StreamInterrupted => write!(f, "stream interrupted"),
            ErrorKind::Other => write!(f, "other error"),
        }
    }
}
