//! Reference Meteora driver.
//!
//! Meteora's dynamic pools charge a fee that grows with realized impact, so
//! the quoted fee rate here is the base rate scaled by the impact fraction.

use crate::error::{Error, Result};
use crate::traits::{SwapRequest, VenueDriver};
use crate::venues::{
    price_impact, sample_delay, sample_execution_price, sample_in_band, synth_tx_ref, VenueParams,
};
use async_trait::async_trait;
use chrono::Utc;
use common::{Quote, SwapResult, TokenPair, Venue};
use rust_decimal::Decimal;
use tracing::debug;

/// Simulated Meteora dynamic pool: impact-scaled fee, shallower depth.
pub struct MeteoraDriver {
    params: VenueParams,
}

impl MeteoraDriver {
    pub fn new(params: VenueParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VenueParams {
        &self.params
    }

    fn dynamic_fee(&self, impact: Decimal) -> Decimal {
        self.params.fee_rate * (Decimal::ONE + impact)
    }
}

impl Default for MeteoraDriver {
    fn default() -> Self {
        Self::new(VenueParams::meteora())
    }
}

#[async_trait]
impl VenueDriver for MeteoraDriver {
    fn venue(&self) -> Venue {
        Venue::Meteora
    }

    async fn quote(&self, pair: &TokenPair, amount_in: Decimal) -> Result<Quote> {
        if amount_in <= Decimal::ZERO {
            return Err(Error::Permanent("non-positive input amount".to_string()));
        }

        tokio::time::sleep(sample_delay(self.params.quote_delay_ms)).await;

        let impact = price_impact(amount_in, self.params.depth, self.params.max_impact);
        let fee_rate = self.dynamic_fee(impact);
        let unit_price = sample_in_band(self.params.price_band);
        let amount_out = amount_in * (Decimal::ONE - fee_rate) * unit_price;

        debug!(
            "meteora quote {}: {} in -> {} out at {} (fee {})",
            pair, amount_in, amount_out, unit_price, fee_rate
        );

        Ok(Quote {
            venue: Venue::Meteora,
            pair: pair.clone(),
            amount_in,
            amount_out,
            unit_price,
            fee_rate,
            price_impact: impact,
            at: Utc::now(),
        })
    }

    async fn swap(&self, req: SwapRequest) -> Result<SwapResult> {
        if req.amount_in <= Decimal::ZERO {
            return Err(Error::Permanent("non-positive input amount".to_string()));
        }

        tokio::time::sleep(sample_delay(self.params.swap_delay_ms)).await;

        let impact = price_impact(req.amount_in, self.params.depth, self.params.max_impact);
        let fee_rate = self.dynamic_fee(impact);
        let executed_price = sample_execution_price(req.expected_unit_price, self.params.price_wobble);
        let amount_out = req.amount_in * (Decimal::ONE - fee_rate) * executed_price;
        let realized_slippage = if req.expected_unit_price.is_zero() {
            Decimal::ZERO
        } else {
            ((req.expected_unit_price - executed_price) / req.expected_unit_price).abs()
        };
        let tx_ref = synth_tx_ref("meteora", &req.order_id);

        debug!(
            "meteora swap for order {}: executed at {} (expected {}), tx {}",
            req.order_id, executed_price, req.expected_unit_price, tx_ref
        );

        Ok(SwapResult {
            tx_ref,
            executed_price,
            amount_out,
            realized_slippage,
            at: Utc::now(),
            wrap: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_pair() -> TokenPair {
        TokenPair::new(
            "So11111111111111111111111111111111111111112",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        )
    }

    #[tokio::test]
    async fn test_fee_grows_with_trade_size() {
        let driver = MeteoraDriver::new(VenueParams::meteora().instant());
        let small = driver.quote(&make_pair(), dec!(1)).await.unwrap();
        let large = driver.quote(&make_pair(), dec!(100000)).await.unwrap();

        assert!(large.fee_rate > small.fee_rate);
        assert!(large.price_impact > small.price_impact);
    }

    #[tokio::test]
    async fn test_swap_produces_venue_tx_ref() {
        let driver = MeteoraDriver::new(VenueParams::meteora().instant());
        let result = driver
            .swap(SwapRequest {
                order_id: "order-1".to_string(),
                pair: make_pair(),
                amount_in: dec!(2),
                expected_unit_price: dec!(142.5),
                slippage_max: dec!(0.01),
            })
            .await
            .unwrap();

        assert!(result.tx_ref.starts_with("meteora-"));
        assert!(result.realized_slippage <= dec!(0.002));
    }
}
