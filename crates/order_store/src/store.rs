//! Authoritative order storage with atomic, monotonic transitions.
//!
//! Backed by a DashMap: each mutation happens under the entry's shard lock,
//! which gives the single-row atomic update the design requires. The
//! transition graph is enforced here; illegal edges and terminal-state
//! mutations are rejected, never silently applied.

use crate::error::{Error, Result};
use chrono::Utc;
use common::{Order, OrderStatus, OrderType, Venue};
use dashmap::DashMap;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Fields supplied at order creation.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_type: OrderType,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub slippage: Decimal,
}

/// Optional fields applied alongside a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub venue: Option<Venue>,
    pub expected_price: Option<Decimal>,
    pub tx_ref: Option<String>,
}

/// Execution outcome applied on the submitted -> confirmed edge.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub venue: Venue,
    pub tx_ref: String,
    pub executed_price: Decimal,
    pub amount_out: Decimal,
}

/// Status breakdown for observability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub pending: usize,
    pub routing: usize,
    pub building: usize,
    pub submitted: usize,
    pub confirmed: usize,
    pub failed: usize,
}

/// In-memory order store.
///
/// The store owns every order; other components refer to orders by id and
/// receive clones.
pub struct OrderStore {
    orders: DashMap<String, Order>,
}

/// The transition graph. Retried attempts re-enter at `Routing`, and any
/// non-terminal state may fail terminally.
fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Routing)
            | (Routing, Building)
            | (Building, Submitted)
            | (Submitted, Confirmed)
            | (Routing | Building | Submitted, Routing)
            | (Pending | Routing | Building | Submitted, Failed)
    )
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    /// Persist a new order in `Pending`.
    pub fn create(&self, draft: OrderDraft) -> Order {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_type: draft.order_type,
            status: OrderStatus::Pending,
            token_in: draft.token_in,
            token_out: draft.token_out,
            amount_in: draft.amount_in,
            slippage: draft.slippage,
            amount_out: None,
            expected_price: None,
            executed_price: None,
            venue: None,
            tx_ref: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.orders.insert(order.id.clone(), order.clone());
        counter!("store_orders_created_total").increment(1);
        debug!("Created order {} ({})", order.id, order.order_type);
        order
    }

    pub fn find(&self, id: &str) -> Result<Order> {
        self.orders
            .get(id)
            .map(|o| o.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// List orders newest-first, optionally filtered by status.
    ///
    /// Returns the page plus the total match count for pagination.
    pub fn list(
        &self,
        status: Option<OrderStatus>,
        limit: usize,
        offset: usize,
    ) -> (Vec<Order>, usize) {
        let mut matching: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.status == s))
            .map(|entry| entry.clone())
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        (page, total)
    }

    pub fn count(&self, status: Option<OrderStatus>) -> usize {
        match status {
            None => self.orders.len(),
            Some(s) => self.orders.iter().filter(|e| e.status == s).count(),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: 0,
            pending: 0,
            routing: 0,
            building: 0,
            submitted: 0,
            confirmed: 0,
            failed: 0,
        };
        for entry in self.orders.iter() {
            stats.total += 1;
            match entry.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Routing => stats.routing += 1,
                OrderStatus::Building => stats.building += 1,
                OrderStatus::Submitted => stats.submitted += 1,
                OrderStatus::Confirmed => stats.confirmed += 1,
                OrderStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Atomically move an order to `new_status`, applying the patch.
    ///
    /// Rejects terminal-state mutations and edges outside the graph.
    pub fn transition(
        &self,
        id: &str,
        new_status: OrderStatus,
        patch: TransitionPatch,
    ) -> Result<Order> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if entry.status.is_terminal() {
            return Err(Error::TerminalState {
                id: id.to_string(),
                status: entry.status,
            });
        }
        if !transition_allowed(entry.status, new_status) {
            return Err(Error::IllegalTransition {
                id: id.to_string(),
                from: entry.status,
                to: new_status,
            });
        }

        entry.status = new_status;
        if let Some(venue) = patch.venue {
            entry.venue = Some(venue);
        }
        if let Some(expected) = patch.expected_price {
            entry.expected_price = Some(expected);
        }
        if let Some(tx_ref) = patch.tx_ref {
            entry.tx_ref = Some(tx_ref);
        }
        Self::touch(&mut entry);
        if new_status.is_terminal() {
            entry.completed_at = Some(entry.updated_at);
        }

        counter!("store_transitions_total", "status" => new_status.to_string()).increment(1);
        Ok(entry.clone())
    }

    /// Apply the execution result atomically with `Submitted -> Confirmed`.
    pub fn record_execution(&self, id: &str, exec: ExecutionRecord) -> Result<Order> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if entry.status.is_terminal() {
            return Err(Error::TerminalState {
                id: id.to_string(),
                status: entry.status,
            });
        }
        if entry.status != OrderStatus::Submitted {
            return Err(Error::IllegalTransition {
                id: id.to_string(),
                from: entry.status,
                to: OrderStatus::Confirmed,
            });
        }

        entry.status = OrderStatus::Confirmed;
        entry.venue = Some(exec.venue);
        entry.tx_ref = Some(exec.tx_ref);
        entry.executed_price = Some(exec.executed_price);
        entry.amount_out = Some(exec.amount_out);
        entry.error_message = None;
        Self::touch(&mut entry);
        entry.completed_at = Some(entry.updated_at);

        counter!("store_transitions_total", "status" => "confirmed").increment(1);
        debug!("Order {} confirmed on {}", id, exec.venue);
        Ok(entry.clone())
    }

    /// Bump the retry counter. Called on every attempt that did not finish
    /// in `Confirmed`.
    pub fn increment_retry(&self, id: &str) -> Result<u32> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if entry.status.is_terminal() {
            return Err(Error::TerminalState {
                id: id.to_string(),
                status: entry.status,
            });
        }

        entry.retry_count += 1;
        Self::touch(&mut entry);
        Ok(entry.retry_count)
    }

    /// Terminal failure: sets the message and final retry count.
    ///
    /// Venue and tx reference are cleared; a failed order carries neither.
    pub fn mark_failed(&self, id: &str, error_message: &str, final_retry_count: u32) -> Result<Order> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if entry.status.is_terminal() {
            return Err(Error::TerminalState {
                id: id.to_string(),
                status: entry.status,
            });
        }

        entry.status = OrderStatus::Failed;
        entry.error_message = Some(error_message.to_string());
        entry.retry_count = final_retry_count;
        entry.venue = None;
        entry.tx_ref = None;
        Self::touch(&mut entry);
        entry.completed_at = Some(entry.updated_at);

        counter!("store_transitions_total", "status" => "failed").increment(1);
        debug!("Order {} failed: {}", id, error_message);
        Ok(entry.clone())
    }

    /// Advance `updated_at`, never backwards.
    fn touch(order: &mut Order) {
        let now = Utc::now();
        if now > order.updated_at {
            order.updated_at = now;
        }
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_draft() -> OrderDraft {
        OrderDraft {
            order_type: OrderType::Market,
            token_in: "11111111111111111111111111111111".to_string(),
            token_out: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            amount_in: dec!(1.5),
            slippage: dec!(0.01),
        }
    }

    fn make_exec() -> ExecutionRecord {
        ExecutionRecord {
            venue: Venue::Raydium,
            tx_ref: "raydium-abc123".to_string(),
            executed_price: dec!(142.1),
            amount_out: dec!(212.6),
        }
    }

    fn advance(store: &OrderStore, id: &str, to: OrderStatus) -> Order {
        store.transition(id, to, TransitionPatch::default()).unwrap()
    }

    #[test]
    fn test_create_starts_pending() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.retry_count, 0);
        assert!(order.completed_at.is_none());
        assert_eq!(store.find(&order.id).unwrap().id, order.id);
    }

    #[test]
    fn test_find_missing_is_not_found() {
        let store = OrderStore::new();
        assert!(matches!(store.find("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_happy_path_transitions() {
        let store = OrderStore::new();
        let order = store.create(make_draft());

        advance(&store, &order.id, OrderStatus::Routing);
        let built = store
            .transition(
                &order.id,
                OrderStatus::Building,
                TransitionPatch {
                    venue: Some(Venue::Meteora),
                    expected_price: Some(dec!(142.3)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(built.venue, Some(Venue::Meteora));
        assert_eq!(built.expected_price, Some(dec!(142.3)));

        advance(&store, &order.id, OrderStatus::Submitted);
        let confirmed = store.record_execution(&order.id, make_exec()).unwrap();

        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.venue, Some(Venue::Raydium));
        assert_eq!(confirmed.tx_ref.as_deref(), Some("raydium-abc123"));
        assert!(confirmed.completed_at.is_some());
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let store = OrderStore::new();
        let order = store.create(make_draft());

        let err = store
            .transition(&order.id, OrderStatus::Submitted, TransitionPatch::default())
            .unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
        // The failed call must not have mutated the row.
        assert_eq!(store.find(&order.id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_retry_reenters_at_routing() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        advance(&store, &order.id, OrderStatus::Routing);
        advance(&store, &order.id, OrderStatus::Building);
        advance(&store, &order.id, OrderStatus::Submitted);

        // A requeued attempt starts over at Routing.
        let rerouted = advance(&store, &order.id, OrderStatus::Routing);
        assert_eq!(rerouted.status, OrderStatus::Routing);
    }

    #[test]
    fn test_terminal_is_a_sink() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        advance(&store, &order.id, OrderStatus::Routing);
        advance(&store, &order.id, OrderStatus::Building);
        advance(&store, &order.id, OrderStatus::Submitted);
        store.record_execution(&order.id, make_exec()).unwrap();

        for op in [
            store
                .transition(&order.id, OrderStatus::Routing, TransitionPatch::default())
                .err(),
            store.record_execution(&order.id, make_exec()).err(),
            store.increment_retry(&order.id).err(),
            store.mark_failed(&order.id, "late failure", 1).err(),
        ] {
            assert!(matches!(op, Some(Error::TerminalState { .. })));
        }

        // Idempotent re-read still works.
        let reread = store.find(&order.id).unwrap();
        assert_eq!(reread.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_record_execution_requires_submitted() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        advance(&store, &order.id, OrderStatus::Routing);

        let err = store.record_execution(&order.id, make_exec()).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
    }

    #[test]
    fn test_mark_failed_clears_venue_and_tx_ref() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        advance(&store, &order.id, OrderStatus::Routing);
        store
            .transition(
                &order.id,
                OrderStatus::Building,
                TransitionPatch {
                    venue: Some(Venue::Raydium),
                    ..Default::default()
                },
            )
            .unwrap();

        let failed = store.mark_failed(&order.id, "slippage exceeded after retries", 3).unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.retry_count, 3);
        assert!(failed.venue.is_none());
        assert!(failed.tx_ref.is_none());
        assert_eq!(
            failed.error_message.as_deref(),
            Some("slippage exceeded after retries")
        );
        assert!(failed.completed_at.is_some());
    }

    #[test]
    fn test_increment_retry() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        assert_eq!(store.increment_retry(&order.id).unwrap(), 1);
        assert_eq!(store.increment_retry(&order.id).unwrap(), 2);
        assert_eq!(store.find(&order.id).unwrap().retry_count, 2);
    }

    #[test]
    fn test_updated_at_monotonic() {
        let store = OrderStore::new();
        let order = store.create(make_draft());
        let mut last = order.updated_at;
        for status in [OrderStatus::Routing, OrderStatus::Building, OrderStatus::Submitted] {
            let updated = advance(&store, &order.id, status);
            assert!(updated.updated_at >= last);
            last = updated.updated_at;
        }
    }

    #[test]
    fn test_list_pagination_and_filter() {
        let store = OrderStore::new();
        let ids: Vec<String> = (0..5).map(|_| store.create(make_draft()).id).collect();
        advance(&store, &ids[0], OrderStatus::Routing);

        let (all, total) = store.list(None, 10, 0);
        assert_eq!(total, 5);
        assert_eq!(all.len(), 5);

        let (page, total) = store.list(None, 2, 2);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (routing, total) = store.list(Some(OrderStatus::Routing), 10, 0);
        assert_eq!(total, 1);
        assert_eq!(routing[0].id, ids[0]);

        assert_eq!(store.count(None), 5);
        assert_eq!(store.count(Some(OrderStatus::Pending)), 4);
    }

    #[test]
    fn test_stats_breakdown() {
        let store = OrderStore::new();
        let a = store.create(make_draft());
        let _b = store.create(make_draft());
        advance(&store, &a.id, OrderStatus::Routing);

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.routing, 1);
        assert_eq!(stats.confirmed, 0);
    }
}
