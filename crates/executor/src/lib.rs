//! Venue drivers and quote routing.
//!
//! This crate provides:
//! - `VenueDriver` trait for venue-specific quoting and swap execution
//! - `Router` for ranking parallel quotes by effective output
//! - Reference drivers for Raydium and Meteora (simulated venues)
//!
//! # Architecture
//!
//! ```text
//!                 ROUTE REQUEST
//!                      │
//!                      ▼
//!                    Router
//!                      │ quotes in parallel
//!            ┌─────────┴─────────┐
//!            ▼                   ▼
//!      RaydiumDriver       MeteoraDriver
//!            │                   │
//!            └───────┬───────────┘
//!                    ▼
//!       rank by effective output
//!       (fee / impact / registration tie-breaks)
//! ```

pub mod error;
pub mod router;
pub mod traits;
pub mod venues;

pub use error::{Error, Result, RouteError};
pub use router::Router;
pub use traits::{SwapRequest, VenueDriver};
pub use venues::{MeteoraDriver, RaydiumDriver, VenueParams};
