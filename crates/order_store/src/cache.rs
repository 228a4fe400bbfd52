//! Hot cache of active orders and the per-order update log.
//!
//! Read-through optimization over the store: entries carry a TTL and are
//! refreshed on every transition. The active set tracks orders that have not
//! yet reached a terminal state. The update log keeps the last transitions
//! per order, readable newest-first, and is the replay mechanism for
//! subscribers that attach late.
//!
//! Cache writes happen after the store write commits, never before. When a
//! Redis mirror is configured the same data is pushed there best-effort on a
//! spawned task; mirror failures are logged and never fail the caller.

use crate::redis_mirror::RedisMirror;
use common::{Order, TransitionEvent};
use dashmap::{DashMap, DashSet};
use metrics::gauge;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache tunables.
#[derive(Debug, Clone)]
pub struct HotCacheConfig {
    /// Entry time-to-live, refreshed on every write.
    pub ttl: Duration,
    /// Maximum retained transitions per order.
    pub log_cap: usize,
}

impl Default for HotCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            log_cap: 50,
        }
    }
}

struct CachedOrder {
    order: Order,
    cached_at: Instant,
}

struct CachedLog {
    events: VecDeque<TransitionEvent>,
    cached_at: Instant,
}

/// In-memory hot cache with optional Redis mirroring.
pub struct HotCache {
    config: HotCacheConfig,
    orders: DashMap<String, CachedOrder>,
    logs: DashMap<String, CachedLog>,
    active: DashSet<String>,
    mirror: Option<Arc<RedisMirror>>,
}

impl HotCache {
    pub fn new(config: HotCacheConfig) -> Self {
        Self {
            config,
            orders: DashMap::new(),
            logs: DashMap::new(),
            active: DashSet::new(),
            mirror: None,
        }
    }

    pub fn with_mirror(config: HotCacheConfig, mirror: Arc<RedisMirror>) -> Self {
        Self {
            mirror: Some(mirror),
            ..Self::new(config)
        }
    }

    /// Start tracking a freshly created order.
    pub fn track(&self, order: &Order) {
        self.active.insert(order.id.clone());
        self.put(order);
        gauge!("cache_active_orders").set(self.active.len() as f64);
    }

    /// Refresh the cached record and append the transition to the log.
    ///
    /// Terminal transitions remove the order from the active set.
    pub fn refresh(&self, order: &Order, event: &TransitionEvent) {
        self.put(order);

        {
            let mut log = self.logs.entry(order.id.clone()).or_insert_with(|| CachedLog {
                events: VecDeque::new(),
                cached_at: Instant::now(),
            });
            log.events.push_back(event.clone());
            while log.events.len() > self.config.log_cap {
                log.events.pop_front();
            }
            log.cached_at = Instant::now();
        }

        if order.status.is_terminal() {
            self.active.remove(&order.id);
            gauge!("cache_active_orders").set(self.active.len() as f64);
        }

        if let Some(mirror) = &self.mirror {
            let mirror = mirror.clone();
            let order = order.clone();
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = mirror.store_order(&order).await {
                    debug!("Redis mirror write failed for {}: {}", order.id, e);
                }
                if let Err(e) = mirror.push_update(&event).await {
                    debug!("Redis mirror log push failed for {}: {}", event.order_id, e);
                }
            });
        }
    }

    /// Re-prime the cache from a store read (read-through miss path).
    ///
    /// Does not touch the active set; terminal orders stay inactive.
    pub fn prime(&self, order: &Order) {
        self.put(order);
    }

    /// Cached record, if present and not expired.
    pub fn get(&self, id: &str) -> Option<Order> {
        if let Some(entry) = self.orders.get(id) {
            if entry.cached_at.elapsed() < self.config.ttl {
                return Some(entry.order.clone());
            }
        } else {
            return None;
        }
        // Expired: drop the stale entry.
        self.orders.remove(id);
        None
    }

    /// Transition history newest-first, bounded by the log cap.
    pub fn updates(&self, id: &str) -> Vec<TransitionEvent> {
        match self.logs.get(id) {
            Some(log) if log.cached_at.elapsed() < self.config.ttl => {
                log.events.iter().rev().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn cached_count(&self) -> usize {
        self.orders.len()
    }

    fn put(&self, order: &Order) {
        self.orders.insert(
            order.id.clone(),
            CachedOrder {
                order: order.clone(),
                cached_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderStatus, OrderType};
    use rust_decimal_macros::dec;

    fn make_order(id: &str, status: OrderStatus) -> Order {
        let now = chrono::Utc::now();
        Order {
            id: id.to_string(),
            order_type: OrderType::Market,
            status,
            token_in: "11111111111111111111111111111111".to_string(),
            token_out: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            amount_in: dec!(1.5),
            slippage: dec!(0.01),
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
        }
    }

    fn make_event(id: &str, status: OrderStatus) -> TransitionEvent {
        TransitionEvent::new(id, status, format!("entered {}", status))
    }

    #[tokio::test]
    async fn test_track_and_get() {
        let cache = HotCache::new(HotCacheConfig::default());
        let order = make_order("o1", OrderStatus::Pending);

        cache.track(&order);
        assert!(cache.is_active("o1"));
        assert_eq!(cache.get("o1").unwrap().id, "o1");
        assert!(cache.get("other").is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = HotCache::new(HotCacheConfig {
            ttl: Duration::from_millis(20),
            log_cap: 50,
        });
        cache.track(&make_order("o1", OrderStatus::Pending));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("o1").is_none());
        assert_eq!(cache.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_updates_record_and_log() {
        let cache = HotCache::new(HotCacheConfig::default());
        let order = make_order("o1", OrderStatus::Pending);
        cache.track(&order);

        let routing = make_order("o1", OrderStatus::Routing);
        cache.refresh(&routing, &make_event("o1", OrderStatus::Routing));

        assert_eq!(cache.get("o1").unwrap().status, OrderStatus::Routing);
        let updates = cache.updates("o1");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, OrderStatus::Routing);
    }

    #[tokio::test]
    async fn test_updates_newest_first_and_capped() {
        let cache = HotCache::new(HotCacheConfig {
            ttl: Duration::from_secs(3600),
            log_cap: 3,
        });
        let order = make_order("o1", OrderStatus::Routing);
        cache.track(&order);

        for status in [
            OrderStatus::Routing,
            OrderStatus::Building,
            OrderStatus::Submitted,
            OrderStatus::Confirmed,
        ] {
            cache.refresh(&make_order("o1", status), &make_event("o1", status));
        }

        let updates = cache.updates("o1");
        assert_eq!(updates.len(), 3);
        // Newest first; the oldest (Routing) fell off the cap.
        assert_eq!(updates[0].status, OrderStatus::Confirmed);
        assert_eq!(updates[2].status, OrderStatus::Building);
    }

    #[tokio::test]
    async fn test_terminal_removes_from_active_set() {
        let cache = HotCache::new(HotCacheConfig::default());
        cache.track(&make_order("o1", OrderStatus::Pending));
        assert_eq!(cache.active_count(), 1);

        let confirmed = make_order("o1", OrderStatus::Confirmed);
        cache.refresh(&confirmed, &make_event("o1", OrderStatus::Confirmed));

        assert!(!cache.is_active("o1"));
        assert_eq!(cache.active_count(), 0);
        // Record stays cached for reads until TTL.
        assert_eq!(cache.get("o1").unwrap().status, OrderStatus::Confirmed);
    }
}
