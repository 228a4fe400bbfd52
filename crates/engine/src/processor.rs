//! Per-job state-machine driver.
//!
//! One `process()` call is one attempt: route, build, submit, confirm. The
//! store write for each edge commits before the matching broadcast fires,
//! so subscribers never observe a status ahead of the store. On failure the
//! retry counter is bumped and the worker decides requeue-vs-terminal from
//! the error kind and attempts used.

use crate::error::ProcessError;
use crate::queue::Job;
use common::{
    Order, OrderStatus, SubscriptionHub, TokenPair, TransitionEvent, WrapMetadata,
};
use executor::{Router, SwapRequest};
use metrics::counter;
use order_store::{ExecutionRecord, HotCache, OrderStore, TransitionPatch};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Sanity gate on queue job ids.
///
/// Jobs whose id fails the policy are skipped without touching order state,
/// so synthetic ids leaking in from test harnesses cannot burn retries.
pub trait OrderIdPolicy: Send + Sync {
    fn is_processable(&self, order_id: &str) -> bool;
}

/// Default policy: the id must parse as a UUID.
pub struct UuidPolicy;

impl OrderIdPolicy for UuidPolicy {
    fn is_processable(&self, order_id: &str) -> bool {
        Uuid::parse_str(order_id).is_ok()
    }
}

/// Pass-through policy for harnesses that mint their own ids.
pub struct AcceptAllPolicy;

impl OrderIdPolicy for AcceptAllPolicy {
    fn is_processable(&self, _order_id: &str) -> bool {
        true
    }
}

/// What the worker should do with the job after one attempt.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Order reached `Confirmed` (or was already terminal). Ack.
    Completed,
    /// Job id failed the sanity gate or the order is unknown. Ack, no state
    /// was touched.
    Skipped,
    /// Retriable failure with attempts remaining. Nack with backoff.
    Retry { error: String },
    /// Terminal failure; the order is already marked `Failed`. Ack.
    Failed,
}

/// Drives one order through the transition graph.
pub struct OrderProcessor {
    store: Arc<OrderStore>,
    cache: Arc<HotCache>,
    router: Arc<Router>,
    hub: Arc<SubscriptionHub>,
    id_policy: Arc<dyn OrderIdPolicy>,
    max_attempts: u32,
}

impl OrderProcessor {
    pub fn new(
        store: Arc<OrderStore>,
        cache: Arc<HotCache>,
        router: Arc<Router>,
        hub: Arc<SubscriptionHub>,
        id_policy: Arc<dyn OrderIdPolicy>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            cache,
            router,
            hub,
            id_policy,
            max_attempts,
        }
    }

    /// Run one attempt for the job.
    pub async fn process(&self, job: &Job) -> ProcessOutcome {
        if !self.id_policy.is_processable(&job.order_id) {
            debug!("Skipping job with unprocessable id '{}'", job.order_id);
            counter!("engine_jobs_skipped_total").increment(1);
            return ProcessOutcome::Skipped;
        }

        let order = match self.store.find(&job.order_id) {
            Ok(order) => order,
            Err(e) => {
                warn!("Job for unknown order {}: {}", job.order_id, e);
                return ProcessOutcome::Skipped;
            }
        };

        if order.status.is_terminal() {
            debug!("Order {} already terminal ({})", order.id, order.status);
            return ProcessOutcome::Completed;
        }

        match self.run_attempt(&order).await {
            Ok(()) => {
                counter!("engine_orders_confirmed_total").increment(1);
                ProcessOutcome::Completed
            }
            Err(err) => self.handle_failure(job, &order, err),
        }
    }

    /// One pass through routing -> building -> submitted -> confirmed.
    async fn run_attempt(&self, order: &Order) -> Result<(), ProcessError> {
        let plan =
            normalizer::wrap_instructions(&order.token_in, &order.token_out, order.amount_in)?;
        let pair = TokenPair::new(plan.normalized_in.clone(), plan.normalized_out.clone());

        // Both address forms travel in the event so the mapping is
        // observable downstream.
        self.apply_transition(
            &order.id,
            OrderStatus::Routing,
            "routing across venues".to_string(),
            TransitionPatch::default(),
            Some(json!({
                "tokenIn": order.token_in,
                "tokenOut": order.token_out,
                "normalizedIn": plan.normalized_in,
                "normalizedOut": plan.normalized_out,
                "amountIn": order.amount_in,
            })),
        )?;

        let (best, decision) = self.router.route(&order.id, &pair, order.amount_in).await?;

        self.apply_transition(
            &order.id,
            OrderStatus::Building,
            format!("selected {}: {}", decision.selected, decision.rationale),
            TransitionPatch {
                venue: Some(best.venue),
                expected_price: Some(best.unit_price),
                ..Default::default()
            },
            serde_json::to_value(&decision).ok(),
        )?;

        self.apply_transition(
            &order.id,
            OrderStatus::Submitted,
            format!("submitting swap to {}", best.venue),
            TransitionPatch::default(),
            Some(json!({
                "venue": best.venue,
                "expectedPrice": best.unit_price,
            })),
        )?;

        let driver = self
            .router
            .driver_for(best.venue)
            .ok_or(ProcessError::DriverMissing(best.venue))?;
        let mut swap = driver
            .swap(SwapRequest {
                order_id: order.id.clone(),
                pair,
                amount_in: order.amount_in,
                expected_unit_price: best.unit_price,
                slippage_max: order.slippage,
            })
            .await?;

        if plan.needs_wrap_in || plan.needs_unwrap_out {
            swap.wrap = Some(WrapMetadata {
                wrapped_in: plan.needs_wrap_in,
                unwrapped_out: plan.needs_unwrap_out,
                wrap_amount: plan.wrap_amount,
            });
        }

        let deviation = if best.unit_price.is_zero() {
            Decimal::ZERO
        } else {
            ((best.unit_price - swap.executed_price) / best.unit_price).abs()
        };
        if deviation > order.slippage {
            return Err(ProcessError::SlippageExceeded {
                expected: best.unit_price,
                executed: swap.executed_price,
                tolerance: order.slippage,
            });
        }

        let confirmed = self.store.record_execution(
            &order.id,
            ExecutionRecord {
                venue: best.venue,
                tx_ref: swap.tx_ref.clone(),
                executed_price: swap.executed_price,
                amount_out: swap.amount_out,
            },
        )?;

        let event = TransitionEvent::new(&order.id, OrderStatus::Confirmed, "swap confirmed")
            .with_data(json!({
                "txRef": swap.tx_ref,
                "executedPrice": swap.executed_price,
                "amountOut": swap.amount_out,
                "realizedSlippage": swap.realized_slippage,
                "wrap": swap.wrap,
            }));
        self.cache.refresh(&confirmed, &event);
        self.hub.broadcast(&event);
        self.hub.close_order(&order.id, "order confirmed");

        Ok(())
    }

    /// Store write first, then cache refresh, then broadcast.
    fn apply_transition(
        &self,
        order_id: &str,
        status: OrderStatus,
        message: String,
        patch: TransitionPatch,
        data: Option<serde_json::Value>,
    ) -> Result<(), ProcessError> {
        let updated = self.store.transition(order_id, status, patch)?;
        let mut event = TransitionEvent::new(order_id, status, message);
        if let Some(data) = data {
            event = event.with_data(data);
        }
        self.cache.refresh(&updated, &event);
        self.hub.broadcast(&event);
        Ok(())
    }

    fn handle_failure(&self, job: &Job, order: &Order, err: ProcessError) -> ProcessOutcome {
        warn!(
            "Attempt {} for order {} failed: {}",
            job.attempt, order.id, err
        );

        let retry_count = match self.store.increment_retry(&order.id) {
            Ok(count) => count,
            Err(e) => {
                error!("Retry bump failed for order {}: {}", order.id, e);
                order.retry_count + 1
            }
        };

        let attempts_used = job.attempt + 1;
        if err.is_retriable() && attempts_used < self.max_attempts {
            counter!("engine_jobs_retried_total").increment(1);
            return ProcessOutcome::Retry {
                error: err.to_string(),
            };
        }

        let message = err.to_string();
        match self.store.mark_failed(&order.id, &message, retry_count) {
            Ok(failed) => {
                let event = TransitionEvent::new(
                    &order.id,
                    OrderStatus::Failed,
                    format!("order failed: {}", message),
                );
                self.cache.refresh(&failed, &event);
                self.hub.broadcast(&event);
                self.hub.close_order(&order.id, "order failed");
                counter!("engine_orders_failed_total").increment(1);
            }
            Err(e) => error!("Terminal mark failed for order {}: {}", order.id, e),
        }

        ProcessOutcome::Failed
    }
}
