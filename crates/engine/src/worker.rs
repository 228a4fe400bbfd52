//! Worker pool: N concurrent consumers of the job queue.
//!
//! Each worker leases a job, takes a rate-limit permit for the start, runs
//! one processor attempt, and acks or nacks based on the outcome. Shutdown
//! is a watch flag: workers finish the attempt in flight, release anything
//! not yet started, and exit.

use crate::processor::{OrderProcessor, ProcessOutcome};
use crate::queue::JobQueue;
use crate::rate_limit::RollingRateLimiter;
use metrics::{counter, gauge};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Worker pool tunables.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Jobs processed in parallel across the pool.
    pub concurrency: usize,
    /// Job starts allowed per rolling window.
    pub rate_limit: u32,
    /// The rolling window; one minute in production, shorter in tests.
    pub rate_window: Duration,
    /// Total attempts per order.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_limit: 100,
            rate_window: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Pool of queue workers plus the queue janitor.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    processor: Arc<OrderProcessor>,
    limiter: Arc<RollingRateLimiter>,
    config: WorkerPoolConfig,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        processor: Arc<OrderProcessor>,
        config: WorkerPoolConfig,
    ) -> Self {
        let limiter = Arc::new(RollingRateLimiter::new(
            config.rate_limit,
            config.rate_window,
        ));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue,
            processor,
            limiter,
            config,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawn the janitor and the worker tasks.
    pub fn start(&mut self) {
        info!(
            "Starting worker pool: {} workers, {} starts per {:?}",
            self.config.concurrency, self.config.rate_limit, self.config.rate_window
        );

        self.handles
            .push(self.queue.clone().spawn_janitor(self.shutdown_tx.subscribe()));

        for worker_id in 0..self.config.concurrency {
            let queue = self.queue.clone();
            let processor = self.processor.clone();
            let limiter = self.limiter.clone();
            let config = self.config.clone();
            let shutdown = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(worker_loop(
                worker_id, queue, processor, limiter, config, shutdown,
            )));
        }

        gauge!("engine_workers").set(self.config.concurrency as f64);
    }

    /// Signal shutdown and wait for every worker to finish its attempt.
    pub async fn shutdown(&mut self) {
        info!("Stopping worker pool");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        gauge!("engine_workers").set(0.0);
        info!("Worker pool stopped");
    }
}

/// Exponential backoff with jitter: min(base * 2^attempt, max) +/- 20%.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32 << attempt.min(16);
    let capped = base.saturating_mul(factor).min(max);
    let jitter = 0.8 + 0.4 * rand::thread_rng().gen::<f64>();
    capped.mul_f64(jitter)
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    processor: Arc<OrderProcessor>,
    limiter: Arc<RollingRateLimiter>,
    config: WorkerPoolConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let job = tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            job = queue.dequeue() => job,
        };

        // Rate-limit the start. A shutdown during the wait releases the job
        // untouched for the next run.
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                queue.release(job);
                break;
            }
            _ = limiter.acquire() => {}
        }

        counter!("engine_jobs_started_total").increment(1);
        let outcome = processor.process(&job).await;

        match outcome {
            ProcessOutcome::Completed => queue.ack_completed(&job.order_id, "completed"),
            ProcessOutcome::Skipped => queue.ack_completed(&job.order_id, "skipped"),
            ProcessOutcome::Failed => queue.ack_failed(&job.order_id, "failed"),
            ProcessOutcome::Retry { error } => {
                let delay = backoff_delay(job.attempt, config.base_delay, config.max_delay);
                debug!(
                    "Worker {} re-queueing order {} after {:?}: {}",
                    worker_id, job.order_id, delay, error
                );
                queue.nack(&job.order_id, delay);
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);

        for attempt in 0..8 {
            let nominal = Duration::from_secs(1 << attempt).min(max);
            let delay = backoff_delay(attempt, base, max);
            assert!(delay >= nominal.mul_f64(0.8), "attempt {}", attempt);
            assert!(delay <= nominal.mul_f64(1.2), "attempt {}", attempt);
        }
    }

    #[test]
    fn test_backoff_never_overflows_on_large_attempt() {
        let delay = backoff_delay(10_000, Duration::from_secs(1), Duration::from_secs(30));
        assert!(delay <= Duration::from_secs(36));
    }
}
