//! Error types for queue and processor.

use common::Venue;
use executor::RouteError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The order already has a live job (ready, delayed, or leased).
    #[error("order '{0}' is already queued")]
    AlreadyQueued(String),
}

/// Failures inside one processing attempt.
///
/// The worker decides retry-vs-terminal from `is_retriable()` and the
/// attempt counter alone; permanent venue failures short-circuit to a
/// terminal state regardless of attempts left.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("routing failed: {0}")]
    Route(#[from] RouteError),

    #[error(transparent)]
    Venue(#[from] executor::Error),

    #[error("slippage exceeded: expected {expected}, executed {executed}, tolerance {tolerance}")]
    SlippageExceeded {
        expected: Decimal,
        executed: Decimal,
        tolerance: Decimal,
    },

    #[error("store error: {0}")]
    Store(#[from] order_store::Error),

    #[error("normalization failed: {0}")]
    Normalize(#[from] normalizer::Error),

    #[error("no driver registered for venue {0}")]
    DriverMissing(Venue),
}

impl ProcessError {
    /// Whether the worker may requeue after this failure.
    pub fn is_retriable(&self) -> bool {
        match self {
            ProcessError::Route(_) => true,
            ProcessError::Venue(e) => e.is_retriable(),
            ProcessError::SlippageExceeded { .. } => true,
            // Store and normalization failures indicate bugs or bad input,
            // not transient conditions.
            ProcessError::Store(_) => false,
            ProcessError::Normalize(_) => false,
            ProcessError::DriverMissing(_) => false,
        }
    }
}
