//! Quote router: parallel venue quoting and deterministic ranking.
//!
//! The router asks every registered driver for a quote in parallel and ranks
//! the answers by effective output (output discounted by price impact). Ties
//! break by lower fee, then lower impact, then driver registration order, so
//! the decision is stable and deterministic for identical quote sets.

use crate::error::RouteError;
use crate::traits::VenueDriver;
use chrono::Utc;
use common::{Quote, RoutingDecision, TokenPair, Venue};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Router over the registered venue drivers.
pub struct Router {
    /// Registration order is the final ranking tie-break.
    drivers: Vec<Arc<dyn VenueDriver>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Register a driver. Order of registration matters for tie-breaking.
    pub fn register(&mut self, driver: Arc<dyn VenueDriver>) {
        info!("Registering venue driver: {}", driver.venue());
        self.drivers.push(driver);
    }

    /// Look up the driver for a venue (first registered wins).
    pub fn driver_for(&self, venue: Venue) -> Option<Arc<dyn VenueDriver>> {
        self.drivers.iter().find(|d| d.venue() == venue).cloned()
    }

    /// Registered venues, in registration order.
    pub fn venues(&self) -> Vec<Venue> {
        self.drivers.iter().map(|d| d.venue()).collect()
    }

    /// Quote all drivers in parallel and pick the best venue.
    ///
    /// Returns the winning quote plus the full decision (ranked quotes and
    /// a human-readable rationale). Fails with [`RouteError::NoQuotes`] when
    /// every driver errored.
    pub async fn route(
        &self,
        order_id: &str,
        pair: &TokenPair,
        amount_in: Decimal,
    ) -> Result<(Quote, RoutingDecision), RouteError> {
        let results = join_all(
            self.drivers
                .iter()
                .map(|driver| driver.quote(pair, amount_in)),
        )
        .await;

        let mut quotes: Vec<(usize, Quote)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(quote) => quotes.push((idx, quote)),
                Err(e) => {
                    warn!(
                        "Quote from {} failed for order {}: {}",
                        self.drivers[idx].venue(),
                        order_id,
                        e
                    );
                    failures.push(format!("{}: {}", self.drivers[idx].venue(), e));
                }
            }
        }

        if quotes.is_empty() {
            return Err(RouteError::NoQuotes(failures.join("; ")));
        }

        rank(&mut quotes);

        let (rationale, price_gap_pct) = explain(&quotes);
        let best = quotes[0].1.clone();
        debug!(
            "Routed order {} to {} ({})",
            order_id, best.venue, rationale
        );

        let decision = RoutingDecision {
            order_id: order_id.to_string(),
            selected: best.venue,
            rationale,
            price_gap_pct,
            quotes: quotes.into_iter().map(|(_, q)| q).collect(),
            at: Utc::now(),
        };

        Ok((best, decision))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank quotes best-first: effective output desc, then fee asc, then impact
/// asc, then registration index asc. Stable for identical inputs.
fn rank(quotes: &mut [(usize, Quote)]) {
    quotes.sort_by(|(a_idx, a), (b_idx, b)| {
        b.effective_output()
            .cmp(&a.effective_output())
            .then_with(|| a.fee_rate.cmp(&b.fee_rate))
            .then_with(|| a.price_impact.cmp(&b.price_impact))
            .then_with(|| a_idx.cmp(b_idx))
    });
}

/// Build the rationale from the deltas that actually decided the ranking.
fn explain(ranked: &[(usize, Quote)]) -> (String, Decimal) {
    let best = &ranked[0].1;
    if ranked.len() == 1 {
        return (
            format!("{} was the only venue with a usable quote", best.venue),
            Decimal::ZERO,
        );
    }

    let runner = &ranked[1].1;
    let eff_best = best.effective_output();
    let eff_runner = runner.effective_output();

    match eff_best.cmp(&eff_runner) {
        Ordering::Greater => {
            let output_gap = pct_gap(eff_best, eff_runner);
            let price_gap = pct_gap(best.unit_price, runner.unit_price);
            (
                format!(
                    "{} over {}: +{}% effective output (price {}{}%, fee {} vs {}, impact {} vs {})",
                    best.venue,
                    runner.venue,
                    output_gap,
                    if price_gap >= Decimal::ZERO { "+" } else { "" },
                    price_gap,
                    fmt_pct(best.fee_rate),
                    fmt_pct(runner.fee_rate),
                    fmt_pct(best.price_impact),
                    fmt_pct(runner.price_impact),
                ),
                output_gap,
            )
        }
        _ => {
            // Effective outputs tied; report the tie-break actually used.
            let detail = if best.fee_rate < runner.fee_rate {
                format!(
                    "lower fee ({} vs {})",
                    fmt_pct(best.fee_rate),
                    fmt_pct(runner.fee_rate)
                )
            } else if best.price_impact < runner.price_impact {
                format!(
                    "lower price impact ({} vs {})",
                    fmt_pct(best.price_impact),
                    fmt_pct(runner.price_impact)
                )
            } else {
                "registration order".to_string()
            };
            (
                format!(
                    "{} over {}: equal effective output, tie broken by {}",
                    best.venue, runner.venue, detail
                ),
                Decimal::ZERO,
            )
        }
    }
}

/// Percentage gap of `a` over `b`, rounded to 4 decimal places.
fn pct_gap(a: Decimal, b: Decimal) -> Decimal {
    if b.is_zero() {
        return Decimal::ZERO;
    }
    ((a - b) / b * Decimal::ONE_HUNDRED).round_dp(4).normalize()
}

/// Format a fractional rate as a percentage string.
fn fmt_pct(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).round_dp(4).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::traits::{SwapRequest, VenueDriver};
    use async_trait::async_trait;
    use common::SwapResult;
    use rust_decimal_macros::dec;

    /// Test driver that always returns a preset quote (or fails).
    struct FixedDriver {
        venue: Venue,
        quote: Option<Quote>,
    }

    impl FixedDriver {
        fn quoting(venue: Venue, quote: Quote) -> Self {
            Self {
                venue,
                quote: Some(quote),
            }
        }

        fn failing(venue: Venue) -> Self {
            Self { venue, quote: None }
        }
    }

    #[async_trait]
    impl VenueDriver for FixedDriver {
        fn venue(&self) -> Venue {
            self.venue
        }

        async fn quote(&self, _pair: &TokenPair, _amount_in: Decimal) -> Result<Quote> {
            self.quote
                .clone()
                .ok_or_else(|| Error::Temporary("venue unavailable".to_string()))
        }

        async fn swap(&self, _req: SwapRequest) -> Result<SwapResult> {
            Err(Error::Temporary("not under test".to_string()))
        }
    }

    fn make_quote(
        venue: Venue,
        amount_out: Decimal,
        unit_price: Decimal,
        fee_rate: Decimal,
        price_impact: Decimal,
    ) -> Quote {
        Quote {
            venue,
            pair: TokenPair::new("A1111111111111111111111111111111", "B1111111111111111111111111111111"),
            amount_in: dec!(1),
            amount_out,
            unit_price,
            fee_rate,
            price_impact,
            at: Utc::now(),
        }
    }

    fn make_pair() -> TokenPair {
        TokenPair::new("A1111111111111111111111111111111", "B1111111111111111111111111111111")
    }

    #[tokio::test]
    async fn test_selects_best_effective_output() {
        let mut router = Router::new();
        router.register(Arc::new(FixedDriver::quoting(
            Venue::Raydium,
            make_quote(Venue::Raydium, dec!(141), dec!(142), dec!(0.0025), dec!(0.01)),
        )));
        router.register(Arc::new(FixedDriver::quoting(
            Venue::Meteora,
            make_quote(Venue::Meteora, dec!(142), dec!(143), dec!(0.0020), dec!(0.01)),
        )));

        let (best, decision) = router.route("order-1", &make_pair(), dec!(1)).await.unwrap();
        assert_eq!(best.venue, Venue::Meteora);
        assert_eq!(decision.selected, Venue::Meteora);
        assert!(decision.price_gap_pct > Decimal::ZERO);
        assert!(decision.rationale.contains("meteora over raydium"));
        assert!(decision.rationale.contains("effective output"));
    }

    #[tokio::test]
    async fn test_tie_breaks_by_lower_fee() {
        let mut router = Router::new();
        router.register(Arc::new(FixedDriver::quoting(
            Venue::Raydium,
            make_quote(Venue::Raydium, dec!(142), dec!(142), dec!(0.0030), dec!(0.01)),
        )));
        router.register(Arc::new(FixedDriver::quoting(
            Venue::Meteora,
            make_quote(Venue::Meteora, dec!(142), dec!(142), dec!(0.0020), dec!(0.01)),
        )));

        let (best, decision) = router.route("order-1", &make_pair(), dec!(1)).await.unwrap();
        assert_eq!(best.venue, Venue::Meteora);
        assert!(decision.rationale.contains("lower fee"));
        assert_eq!(decision.price_gap_pct, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_tie_breaks_by_registration_order() {
        // Identical quotes from two drivers: first registered must win.
        let quote_a = make_quote(Venue::Raydium, dec!(142), dec!(142.1), dec!(0.0025), dec!(0.01));
        let quote_b = make_quote(Venue::Meteora, dec!(142), dec!(142.9), dec!(0.0025), dec!(0.01));

        let mut router = Router::new();
        router.register(Arc::new(FixedDriver::quoting(Venue::Raydium, quote_a)));
        router.register(Arc::new(FixedDriver::quoting(Venue::Meteora, quote_b)));

        let (best, decision) = router.route("order-1", &make_pair(), dec!(1)).await.unwrap();
        assert_eq!(best.venue, Venue::Raydium);
        assert!(decision.rationale.contains("registration order"));
    }

    #[tokio::test]
    async fn test_deterministic_for_identical_quote_sets() {
        let build = || {
            let mut router = Router::new();
            router.register(Arc::new(FixedDriver::quoting(
                Venue::Raydium,
                make_quote(Venue::Raydium, dec!(141.5), dec!(142), dec!(0.0025), dec!(0.012)),
            )));
            router.register(Arc::new(FixedDriver::quoting(
                Venue::Meteora,
                make_quote(Venue::Meteora, dec!(141.5), dec!(142), dec!(0.0025), dec!(0.011)),
            )));
            router
        };

        let (best_a, decision_a) = build().route("o", &make_pair(), dec!(1)).await.unwrap();
        let (best_b, decision_b) = build().route("o", &make_pair(), dec!(1)).await.unwrap();

        assert_eq!(best_a.venue, best_b.venue);
        assert_eq!(decision_a.rationale, decision_b.rationale);
        assert_eq!(decision_a.price_gap_pct, decision_b.price_gap_pct);
        assert!(decision_a.rationale.contains("lower price impact"));
    }

    #[tokio::test]
    async fn test_partial_failure_still_routes() {
        let mut router = Router::new();
        router.register(Arc::new(FixedDriver::failing(Venue::Raydium)));
        router.register(Arc::new(FixedDriver::quoting(
            Venue::Meteora,
            make_quote(Venue::Meteora, dec!(142), dec!(142), dec!(0.0020), dec!(0.01)),
        )));

        let (best, decision) = router.route("order-1", &make_pair(), dec!(1)).await.unwrap();
        assert_eq!(best.venue, Venue::Meteora);
        assert!(decision.rationale.contains("only venue"));
        assert_eq!(decision.quotes.len(), 1);
    }

    #[tokio::test]
    async fn test_all_failures_is_no_quotes() {
        let mut router = Router::new();
        router.register(Arc::new(FixedDriver::failing(Venue::Raydium)));
        router.register(Arc::new(FixedDriver::failing(Venue::Meteora)));

        let err = router.route("order-1", &make_pair(), dec!(1)).await.unwrap_err();
        let RouteError::NoQuotes(detail) = err;
        assert!(detail.contains("raydium"));
        assert!(detail.contains("meteora"));
    }
}
