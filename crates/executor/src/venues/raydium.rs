//! Reference Raydium driver.

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

/// Simulated Raydium AMM: constant fee, deep pool.
pub struct RaydiumDriver {
    params: VenueParams,
}

impl RaydiumDriver {
    pub fn new(params: VenueParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VenueParams {
        &self.params
    }
}

impl Default for RaydiumDriver {
    fn default() -> Self {
        Self::new(VenueParams::raydium())
    }
}

#[async_trait]
impl VenueDriver for RaydiumDriver {
    fn venue(&self) -> Venue {
        Venue::Raydium
    }

    async fn quote(&self, pair: &TokenPair, amount_in: Decimal) -> Result<Quote> {
        if amount_in <= Decimal::ZERO {
            return Err(Error::Permanent("non-positive input amount".to_string()));
        }

        tokio::time::sleep(sample_delay(self.params.quote_delay_ms)).await;

        let unit_price = sample_in_band(self.params.price_band);
        let amount_out = amount_in * (Decimal::ONE - self.params.fee_rate) * unit_price;
        let impact = price_impact(amount_in, self.params.depth, self.params.max_impact);

        debug!(
            "raydium quote {}: {} in -> {} out at {}",
            pair, amount_in, amount_out, unit_price
        );

        Ok(Quote {
            venue: Venue::Raydium,
            pair: pair.clone(),
            amount_in,
            amount_out,
            unit_price,
            fee_rate: self.params.fee_rate,
            price_impact: impact,
            at: Utc::now(),
        })
    }

    async fn swap(&self, req: SwapRequest) -> Result<SwapResult> {
        if req.amount_in <= Decimal::ZERO {
            return Err(Error::Permanent("non-positive input amount".to_string()));
        }

        tokio::time::sleep(sample_delay(self.params.swap_delay_ms)).await;

        let executed_price = sample_execution_price(req.expected_unit_price, self.params.price_wobble);
        let amount_out = req.amount_in * (Decimal::ONE - self.params.fee_rate) * executed_price;
        let realized_slippage = if req.expected_unit_price.is_zero() {
            Decimal::ZERO
        } else {
            ((req.expected_unit_price - executed_price) / req.expected_unit_price).abs()
        };
        let tx_ref = synth_tx_ref("raydium", &req.order_id);

        debug!(
            "raydium swap for order {}: executed at {} (expected {}), tx {}",
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
    async fn test_quote_output_formula() {
        let driver = RaydiumDriver::new(VenueParams::raydium().instant());
        let quote = driver.quote(&make_pair(), dec!(1.5)).await.unwrap();

        assert_eq!(quote.venue, Venue::Raydium);
        assert_eq!(
            quote.amount_out,
            dec!(1.5) * (Decimal::ONE - quote.fee_rate) * quote.unit_price
        );
        assert!(quote.unit_price >= dec!(141.80) && quote.unit_price <= dec!(143.20));
    }

    #[tokio::test]
    async fn test_quote_rejects_zero_amount() {
        let driver = RaydiumDriver::new(VenueParams::raydium().instant());
        let err = driver.quote(&make_pair(), Decimal::ZERO).await.unwrap_err();
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn test_swap_anchored_to_expected_price() {
        let driver = RaydiumDriver::new(VenueParams::raydium().instant());
        let result = driver
            .swap(SwapRequest {
                order_id: "order-1".to_string(),
                pair: make_pair(),
                amount_in: dec!(1.5),
                expected_unit_price: dec!(142),
                slippage_max: dec!(0.01),
            })
            .await
            .unwrap();

        assert!(result.realized_slippage <= dec!(0.002));
        assert!(result.tx_ref.starts_with("raydium-"));
        assert!(result.amount_out > Decimal::ZERO);
    }
}
