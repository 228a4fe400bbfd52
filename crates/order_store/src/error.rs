//! Error types for the order store.

use common::OrderStatus;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No order with this id.
    #[error("order '{0}' not found")]
    NotFound(String),

    /// The requested edge is not in the transition graph. Indicates a bug
    /// in the caller; never retried.
    #[error("illegal transition {from} -> {to} for order '{id}'")]
    IllegalTransition {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Attempted mutation of an order already in a terminal state.
    #[error("order '{id}' is terminal ({status}); no further mutations")]
    TerminalState { id: String, status: OrderStatus },

    /// Redis mirror failure (best-effort path only).
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization failure on the mirror path.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
