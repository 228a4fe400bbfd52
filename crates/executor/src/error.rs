//! Error types for venue drivers and the router.

use thiserror::Error;

/// Result type alias for venue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Venue driver errors.
///
/// The taxonomy is the retry contract: `Temporary` failures may be retried
/// by the worker, `Permanent` failures short-circuit to a terminal state.
#[derive(Debug, Error)]
pub enum Error {
    /// Transient venue failure (congestion, timeout, stale pool state).
    #[error("temporary venue failure: {0}")]
    Temporary(String),

    /// Non-retriable venue failure (unsupported pair, frozen pool).
    #[error("permanent venue failure: {0}")]
    Permanent(String),
}

impl Error {
    /// Whether the worker may retry after this failure.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Temporary(_))
    }
}

/// Router errors.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Every registered driver failed to quote. Retriable.
    #[error("no venue produced a quote: {0}")]
    NoQuotes(String),
}
