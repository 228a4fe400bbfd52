//! Venue driver trait for venue-specific quoting and execution.
//!
//! Each venue (Raydium, Meteora, ...) implements this trait to provide a
//! unified interface for quote requests and swap execution.

use crate::error::Result;
use async_trait::async_trait;
use common::{Quote, SwapResult, TokenPair, Venue};
use rust_decimal::Decimal;

/// Parameters for a swap call against one venue.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    /// The order this swap executes; venues echo it into the tx reference.
    pub order_id: String,
    /// Normalized pair (wrapped mints only).
    pub pair: TokenPair,
    pub amount_in: Decimal,
    /// Unit price the router quoted; execution is anchored to it.
    pub expected_unit_price: Decimal,
    /// Maximum tolerated fractional price deviation.
    pub slippage_max: Decimal,
}

/// Trait for venue-specific quoting and swap execution.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl VenueDriver for RaydiumDriver {
///     fn venue(&self) -> Venue {
///         Venue::Raydium
///     }
///
///     async fn quote(&self, pair: &TokenPair, amount_in: Decimal) -> Result<Quote> {
///         // Implementation
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait VenueDriver: Send + Sync {
    /// The venue this driver executes against.
    fn venue(&self) -> Venue;

    /// Quote the pair for the given input amount.
    ///
    /// May fail `Temporary` (retriable) or `Permanent` (not retriable).
    /// `price_impact` must be monotonically nondecreasing in `amount_in`.
    async fn quote(&self, pair: &TokenPair, amount_in: Decimal) -> Result<Quote>;

    /// Execute a swap. Same failure taxonomy as [`VenueDriver::quote`].
    async fn swap(&self, req: SwapRequest) -> Result<SwapResult>;
}
