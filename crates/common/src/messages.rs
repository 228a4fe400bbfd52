//! Stream protocol message types.
//!
//! Defines the JSON message format pushed to order subscribers.

use crate::types::{OrderStatus, TransitionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message sent from the engine to a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamMessage {
    /// Emitted once, immediately after a subscription is registered.
    Connected {
        order_id: String,
        at: DateTime<Utc>,
    },
    /// One per state-machine transition, in commit order.
    StatusUpdate {
        order_id: String,
        status: OrderStatus,
        at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Keepalive probe.
    Ping { at: DateTime<Utc> },
    /// Keepalive answer.
    Pong { at: DateTime<Utc> },
    /// Emitted before a subscription is torn down (terminal state, client
    /// request, or engine shutdown).
    Closing {
        order_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl StreamMessage {
    pub fn connected(order_id: impl Into<String>) -> Self {
        StreamMessage::Connected {
            order_id: order_id.into(),
            at: Utc::now(),
        }
    }

    pub fn closing(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamMessage::Closing {
            order_id: order_id.into(),
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        StreamMessage::Pong { at: Utc::now() }
    }
}

impl From<&TransitionEvent> for StreamMessage {
    fn from(event: &TransitionEvent) -> Self {
        StreamMessage::StatusUpdate {
            order_id: event.order_id.clone(),
            status: event.status,
            at: event.at,
            message: Some(event.message.clone()),
            data: event.data.clone(),
        }
    }
}

/// Message sent from a subscriber to the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive; answered with a `pong`.
    Ping,
}
