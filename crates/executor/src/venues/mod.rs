//! Reference venue drivers.
//!
//! These drivers simulate AMM behavior: per-call unit prices sampled inside
//! a venue-specific band, price impact that grows with trade size, and
//! execution anchored to the quoted price within a small wobble. They are
//! the default wiring for local runs and the test suite; any
//! [`crate::VenueDriver`] implementation can replace them.

mod meteora;
mod raydium;

pub use meteora::MeteoraDriver;
pub use raydium::RaydiumDriver;

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Tunables for one reference driver.
#[derive(Debug, Clone)]
pub struct VenueParams {
    /// Base fee rate applied to the input amount.
    pub fee_rate: Decimal,
    /// Unit price is sampled uniformly inside this band per call.
    pub price_band: (Decimal, Decimal),
    /// Simulated pool depth; impact approaches `max_impact` as the input
    /// amount dominates the depth.
    pub depth: Decimal,
    pub max_impact: Decimal,
    /// Maximum fractional deviation of the executed price from the quoted
    /// price. Must stay below the slippage bounds used in tests.
    pub price_wobble: Decimal,
    pub quote_delay_ms: (u64, u64),
    pub swap_delay_ms: (u64, u64),
}

impl VenueParams {
    /// Raydium defaults: 0.25% fee, tighter price band, deeper pool.
    pub fn raydium() -> Self {
        Self {
            fee_rate: dec!(0.0025),
            price_band: (dec!(141.80), dec!(143.20)),
            depth: dec!(250000),
            max_impact: dec!(0.25),
            price_wobble: dec!(0.002),
            quote_delay_ms: (5, 25),
            swap_delay_ms: (150, 400),
        }
    }

    /// Meteora defaults: 0.20% base fee scaled by impact, wider band.
    pub fn meteora() -> Self {
        Self {
            fee_rate: dec!(0.0020),
            price_band: (dec!(141.50), dec!(143.50)),
            depth: dec!(180000),
            max_impact: dec!(0.25),
            price_wobble: dec!(0.002),
            quote_delay_ms: (5, 25),
            swap_delay_ms: (150, 400),
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_swap_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.swap_delay_ms = (min, max);
        self
    }

    /// Zero delays, for tests that drive many orders through the engine.
    pub fn instant(mut self) -> Self {
        self.quote_delay_ms = (0, 0);
        self.swap_delay_ms = (0, 0);
        self
    }
}

/// Uniform sample inside an inclusive decimal band.
pub(crate) fn sample_in_band(band: (Decimal, Decimal)) -> Decimal {
    let frac = Decimal::from_f64(rand::thread_rng().gen::<f64>()).unwrap_or(dec!(0.5));
    band.0 + (band.1 - band.0) * frac
}

/// Uniform sample inside an inclusive millisecond range.
pub(crate) fn sample_delay(range: (u64, u64)) -> Duration {
    if range.1 == 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(range.0..=range.1);
    Duration::from_millis(ms)
}

/// AMM-style price impact: monotonically nondecreasing in `amount_in`,
/// asymptotic to `max_impact`.
pub(crate) fn price_impact(amount_in: Decimal, depth: Decimal, max_impact: Decimal) -> Decimal {
    if amount_in <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    max_impact * (amount_in / (amount_in + depth))
}

/// Synthesize a deterministic-looking transaction reference.
///
/// First 16 chars of SHA256 hex over venue, order id, and a timestamp.
pub(crate) fn synth_tx_ref(venue: &str, order_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(venue.as_bytes());
    hasher.update(order_id.as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", venue, &digest[..16])
}

/// Executed price anchored to the quote, deviating by at most the wobble.
pub(crate) fn sample_execution_price(expected: Decimal, wobble: Decimal) -> Decimal {
    let frac = Decimal::from_f64(rand::thread_rng().gen::<f64>()).unwrap_or(dec!(0.5));
    // Map [0, 1] onto [-wobble, +wobble].
    let deviation = wobble * (frac * dec!(2) - Decimal::ONE);
    expected * (Decimal::ONE + deviation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_impact_monotone_in_amount() {
        let depth = dec!(10000);
        let max = dec!(0.25);
        let mut last = Decimal::ZERO;
        for amount in [dec!(0.5), dec!(1), dec!(100), dec!(10000), dec!(1000000)] {
            let impact = price_impact(amount, depth, max);
            assert!(impact >= last, "impact must not decrease");
            assert!(impact < max);
            last = impact;
        }
    }

    #[test]
    fn test_price_impact_zero_for_zero_amount() {
        assert_eq!(price_impact(Decimal::ZERO, dec!(1000), dec!(0.25)), Decimal::ZERO);
    }

    #[test]
    fn test_sample_in_band_stays_inside() {
        let band = (dec!(100), dec!(101));
        for _ in 0..100 {
            let sample = sample_in_band(band);
            assert!(sample >= band.0 && sample <= band.1);
        }
    }

    #[test]
    fn test_execution_price_respects_wobble() {
        let expected = dec!(142);
        let wobble = dec!(0.002);
        for _ in 0..100 {
            let executed = sample_execution_price(expected, wobble);
            let deviation = ((expected - executed) / expected).abs();
            assert!(deviation <= wobble);
        }
    }

    #[test]
    fn test_tx_ref_shape() {
        let tx = synth_tx_ref("raydium", "order-1");
        assert!(tx.starts_with("raydium-"));
        assert_eq!(tx.len(), "raydium-".len() + 16);
    }
}
