//! Queue, worker pool, and the per-order state machine.
//!
//! This crate turns accepted orders into terminal outcomes:
//! - `JobQueue` - FIFO-within-priority job queue with lease/ack semantics
//!   and a visibility timeout, so a crashed worker's job is re-delivered
//! - `RollingRateLimiter` - bounds job starts per rolling window
//! - `OrderProcessor` - drives one order through the transition graph,
//!   broadcasting every committed edge to the subscription hub
//! - `WorkerPool` - N concurrent workers with exponential-backoff retry
//!
//! # Data flow
//!
//! ```text
//!   enqueue ──▶ JobQueue ──lease──▶ worker ──▶ OrderProcessor
//!                  ▲                  │            │
//!                  └──nack(backoff)───┘            ▼
//!                                       Router / VenueDriver
//!                                       OrderStore / HotCache
//!                                       SubscriptionHub
//! ```

pub mod error;
pub mod processor;
pub mod queue;
pub mod rate_limit;
pub mod worker;

pub use error::{ProcessError, QueueError};
pub use processor::{AcceptAllPolicy, OrderIdPolicy, OrderProcessor, ProcessOutcome, UuidPolicy};
pub use queue::{Job, JobQueue, JobRecord, QueueConfig, QueueStats};
pub use rate_limit::RollingRateLimiter;
pub use worker::{WorkerPool, WorkerPoolConfig};
