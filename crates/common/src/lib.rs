//! Shared domain types and the subscription hub.
//!
//! This crate holds everything more than one service layer needs:
//! - Order, quote, and transition types used across the engine
//! - The JSON stream protocol spoken to subscribers
//! - The per-order subscription hub that fans transitions out to sinks

pub mod hub;
pub mod messages;
pub mod types;

pub use hub::{HubStats, SubscriberId, SubscriptionHandle, SubscriptionHub};
pub use messages::{ClientMessage, StreamMessage};
pub use types::{
    Order, OrderStatus, OrderType, Quote, RoutingDecision, SwapResult, TokenPair, TransitionEvent,
    Venue, WrapMetadata,
};
