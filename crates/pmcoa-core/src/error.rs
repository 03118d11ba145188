//! Common error type for fetching work-item inputs

use crate::http::StreamError;

/// Error from acquiring one item's input (archive download, unpack, lookup).
///
/// Wraps either a network/HTTP error ([`StreamError`]), a local I/O error, or
/// a missing input that no retry can produce.
#[derive(Debug)]
pub enum FetchError {
    Stream(StreamError),
    Io(std::io::Error),
    Missing(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Missing(what) => write!(f, "missing: {what}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Missing(_) => None,
        }
    }
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_retryable(),
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
            Self::Missing(_) => false,
        }
    }
}

impl From<StreamError> for FetchError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
