//! Best-effort Redis mirror for the hot cache.
//!
//! Mirrors cached order records and the per-order update log so an operator
//! can inspect live state (or warm a restart) from Redis. The in-memory
//! cache never reads back from here; the store remains the source of truth.

use crate::error::Result;
use common::{Order, TransitionEvent};
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::debug;

/// Redis key prefix for order records: order:{id}
pub const ORDER_KEY_PREFIX: &str = "order:";

/// Redis key prefix for update logs: updates:{id}
pub const UPDATES_KEY_PREFIX: &str = "updates:";

/// Shared Redis client wrapper for cache mirroring.
#[derive(Clone)]
pub struct RedisMirror {
    client: Arc<redis::Client>,
    ttl_secs: u64,
    log_cap: isize,
}

impl RedisMirror {
    pub fn new(redis_url: &str, ttl_secs: u64, log_cap: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            ttl_secs,
            log_cap: log_cap as isize,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Mirror an order record with TTL.
    pub async fn store_order(&self, order: &Order) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let key = format!("{}{}", ORDER_KEY_PREFIX, order.id);
        let json = serde_json::to_string(order)?;

        conn.set_ex::<_, _, ()>(&key, &json, self.ttl_secs).await?;
        debug!("Mirrored order {} ({})", order.id, order.status);
        Ok(())
    }

    /// Append a transition to the order's capped update list.
    pub async fn push_update(&self, event: &TransitionEvent) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let key = format!("{}{}", UPDATES_KEY_PREFIX, event.order_id);
        let json = serde_json::to_string(event)?;

        // Newest at the head; trim to the cap; refresh the TTL.
        conn.lpush::<_, _, ()>(&key, &json).await?;
        conn.ltrim::<_, ()>(&key, 0, self.log_cap - 1).await?;
        conn.expire::<_, ()>(&key, self.ttl_secs as i64).await?;
        Ok(())
    }

    /// Read the mirrored update log, newest first.
    pub async fn get_updates(&self, order_id: &str) -> Result<Vec<TransitionEvent>> {
        let mut conn = self.get_connection().await?;
        let key = format!("{}{}", UPDATES_KEY_PREFIX, order_id);

        let entries: Vec<String> = conn.lrange(&key, 0, self.log_cap - 1).await?;
        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            events.push(serde_json::from_str(&entry)?);
        }
        Ok(events)
    }
}
