//! Per-order subscription fan-out.
//!
//! Uses lock-free DashMap for high-throughput concurrent access. Each order
//! id maps to a set of subscriber slots; a slot is a non-blocking channel
//! sender, so one slow subscriber can never stall a broadcast (the transport
//! layer drains the channel at its own pace).

use crate::messages::StreamMessage;
use crate::types::TransitionEvent;
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Unique subscriber identifier.
pub type SubscriberId = Uuid;

/// One registered sink for one order.
struct SubscriberSlot {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<StreamMessage>,
    open: AtomicBool,
}

impl SubscriberSlot {
    /// Deliver a message. Returns false when the sink is closed or gone.
    fn send(&self, msg: StreamMessage) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(msg).is_ok()
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Handle returned to the transport layer on registration.
///
/// Dropping the handle (or its receiver) marks the sink dead; the hub prunes
/// it on the next delivery attempt.
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    pub order_id: String,
    pub rx: mpsc::UnboundedReceiver<StreamMessage>,
}

/// Hub statistics for observability.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub tracked_orders: usize,
    pub active_subscribers: usize,
    pub total_registered: u64,
    pub total_delivered: u64,
    pub total_closed: u64,
}

/// Registry of order subscribers with broadcast fan-out.
pub struct SubscriptionHub {
    /// order_id -> (subscriber_id -> slot)
    subscribers: DashMap<String, DashMap<SubscriberId, Arc<SubscriberSlot>>>,
    total_registered: AtomicU64,
    total_delivered: AtomicU64,
    total_closed: AtomicU64,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            total_registered: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
        }
    }

    /// Register a sink for an order and immediately emit `connected`.
    pub fn register(&self, order_id: &str) -> SubscriptionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = Arc::new(SubscriberSlot {
            id: Uuid::new_v4(),
            tx,
            open: AtomicBool::new(true),
        });
        let id = slot.id;

        slot.send(StreamMessage::connected(order_id));

        self.subscribers
            .entry(order_id.to_string())
            .or_default()
            .insert(id, slot);

        self.total_registered.fetch_add(1, Ordering::Relaxed);
        counter!("hub_subscriptions_total").increment(1);
        gauge!("hub_active_subscribers").set(self.active_subscribers() as f64);
        debug!("Subscriber {} registered for order {}", id, order_id);

        SubscriptionHandle {
            id,
            order_id: order_id.to_string(),
            rx,
        }
    }

    /// Remove one subscriber (client disconnect). Never affects processing.
    pub fn unregister(&self, order_id: &str, id: &SubscriberId) {
        if let Some(slots) = self.subscribers.get(order_id) {
            if let Some((_, slot)) = slots.remove(id) {
                slot.close();
                debug!("Subscriber {} unregistered from order {}", id, order_id);
            }
        }
        self.prune_if_empty(order_id);
        gauge!("hub_active_subscribers").set(self.active_subscribers() as f64);
    }

    /// Deliver a transition to every live sink for the event's order.
    ///
    /// Dead sinks encountered during delivery are removed atomically.
    pub fn broadcast(&self, event: &TransitionEvent) {
        let Some(slots) = self.subscribers.get(&event.order_id) else {
            return;
        };

        let msg = StreamMessage::from(event);
        let mut dead: Vec<SubscriberId> = Vec::new();
        let mut delivered = 0u64;

        for entry in slots.iter() {
            if entry.value().send(msg.clone()) {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for id in dead {
            if let Some((_, slot)) = slots.remove(&id) {
                slot.close();
                debug!(
                    "Removed dead subscriber {} from order {}",
                    id, event.order_id
                );
            }
        }
        drop(slots);

        self.total_delivered.fetch_add(delivered, Ordering::Relaxed);
        counter!("hub_messages_delivered_total").increment(delivered);
    }

    /// Emit `closing` to every sink for the order, then drop the entry.
    pub fn close_order(&self, order_id: &str, reason: &str) {
        if let Some((_, slots)) = self.subscribers.remove(order_id) {
            let mut closed = 0u64;
            for (_, slot) in slots {
                slot.send(StreamMessage::closing(order_id, reason));
                slot.close();
                closed += 1;
            }
            self.total_closed.fetch_add(closed, Ordering::Relaxed);
            counter!("hub_subscriptions_closed_total").increment(closed);
            debug!(
                "Closed {} subscriber(s) for order {} ({})",
                closed, order_id, reason
            );
        }
        gauge!("hub_active_subscribers").set(self.active_subscribers() as f64);
    }

    /// Close every registered sink. Invoked at shutdown.
    pub fn close_all(&self, reason: &str) {
        let order_ids: Vec<String> = self.subscribers.iter().map(|e| e.key().clone()).collect();
        for order_id in order_ids {
            self.close_order(&order_id, reason);
        }
    }

    /// Number of live sinks for one order.
    pub fn subscriber_count(&self, order_id: &str) -> usize {
        self.subscribers
            .get(order_id)
            .map(|slots| slots.len())
            .unwrap_or(0)
    }

    /// Number of live sinks across all orders.
    pub fn active_subscribers(&self) -> usize {
        self.subscribers.iter().map(|e| e.value().len()).sum()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            tracked_orders: self.subscribers.len(),
            active_subscribers: self.active_subscribers(),
            total_registered: self.total_registered.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
        }
    }

    fn prune_if_empty(&self, order_id: &str) {
        self.subscribers
            .remove_if(order_id, |_, slots| slots.is_empty());
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}
