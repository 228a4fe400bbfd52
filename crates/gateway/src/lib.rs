//! HTTP and WebSocket surface for the execution engine.
//!
//! This crate provides:
//! - REST API for order submission, lookup, listing, and stats
//! - WebSocket endpoint streaming per-order status transitions
//! - `Config` parsed from the environment
//! - The service binary wiring everything together
//!
//! Endpoints:
//! - `POST /orders` - Submit a market swap order
//! - `GET /orders` - List orders (status filter + pagination)
//! - `GET /orders/{id}` - Fetch one order
//! - `GET /orders/{id}/updates` - Transition history, newest first
//! - `GET /stats` - Store, queue, hub, and cache statistics
//! - `GET /health` - Health check
//! - `GET /ws/orders/{id}` - Subscribe to status transitions

pub mod api;
pub mod config;
pub mod error;
pub mod ws_server;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::ApiError;
