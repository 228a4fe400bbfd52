//! Order persistence and the hot cache.
//!
//! Provides the authoritative order store (single-row atomic updates with a
//! monotonic transition check) and a read-through hot cache with a bounded
//! per-order update log. The cache is an optimization only; the store is
//! always the source of truth, and cache writes happen strictly after the
//! store write commits.

pub mod cache;
pub mod error;
pub mod redis_mirror;
pub mod store;

pub use cache::{HotCache, HotCacheConfig};
pub use error::{Error, Result};
pub use redis_mirror::RedisMirror;
pub use store::{ExecutionRecord, OrderDraft, OrderStore, StoreStats, TransitionPatch};
