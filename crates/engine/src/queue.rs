//! Job queue with lease/ack semantics.
//!
//! FIFO within priority. A dequeue takes a lease with a visibility timeout;
//! if the worker neither acks nor nacks before the deadline (crash, stall),
//! housekeeping re-queues the job with the attempt counter bumped. At most
//! one worker holds a given order's job at any instant.
//!
//! Completed and failed job records are retained (bounded) for
//! observability.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Queue tunables.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a lease lasts before the job is considered abandoned.
    pub visibility_timeout: Duration,
    /// Retained completed job records.
    pub completed_retention: usize,
    /// Retained failed job records.
    pub failed_retention: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(60),
            completed_retention: 100,
            failed_retention: 50,
        }
    }
}

/// Default job priority. Lower values dequeue first.
pub const DEFAULT_PRIORITY: u8 = 1;

/// One unit of work: process the order with this id.
#[derive(Debug, Clone)]
pub struct Job {
    pub order_id: String,
    pub priority: u8,
    /// 0-indexed attempt counter; bumped on nack and on lease expiry.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Retained record of a finished job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub order_id: String,
    pub attempts: u32,
    pub outcome: String,
    pub finished_at: DateTime<Utc>,
}

/// Queue depths and retention counts for observability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub ready: usize,
    pub leased: usize,
    pub delayed: usize,
    pub completed_retained: usize,
    pub failed_retained: usize,
}

struct LeasedJob {
    job: Job,
    deadline: Instant,
}

struct DelayedJob {
    job: Job,
    ready_at: Instant,
}

#[derive(Default)]
struct QueueState {
    /// priority -> FIFO of ready jobs.
    ready: BTreeMap<u8, VecDeque<Job>>,
    leased: HashMap<String, LeasedJob>,
    delayed: Vec<DelayedJob>,
    completed: VecDeque<JobRecord>,
    failed: VecDeque<JobRecord>,
}

impl QueueState {
    fn ready_count(&self) -> usize {
        self.ready.values().map(|q| q.len()).sum()
    }

    fn contains(&self, order_id: &str) -> bool {
        self.leased.contains_key(order_id)
            || self.delayed.iter().any(|d| d.job.order_id == order_id)
            || self
                .ready
                .values()
                .any(|q| q.iter().any(|j| j.order_id == order_id))
    }
}

/// The work queue shared by intake and the worker pool.
pub struct JobQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue an order at the default priority.
    ///
    /// Returns once the job is recorded; rejects an order that already has a
    /// live job (the single-lease invariant starts here).
    pub fn enqueue(&self, order_id: &str) -> Result<(), QueueError> {
        self.enqueue_with_priority(order_id, DEFAULT_PRIORITY)
    }

    pub fn enqueue_with_priority(&self, order_id: &str, priority: u8) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().expect("queue lock poisoned");
            if state.contains(order_id) {
                return Err(QueueError::AlreadyQueued(order_id.to_string()));
            }
            state.ready.entry(priority).or_default().push_back(Job {
                order_id: order_id.to_string(),
                priority,
                attempt: 0,
                enqueued_at: Utc::now(),
            });
            self.publish_depth(&state);
        }
        self.notify.notify_one();
        debug!("Enqueued job for order {}", order_id);
        Ok(())
    }

    /// Lease the next ready job. Pends until one is available.
    ///
    /// Callers must eventually ack, nack, or release the job; otherwise the
    /// visibility timeout re-queues it.
    pub async fn dequeue(&self) -> Job {
        loop {
            if let Some(job) = self.try_lease() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    fn try_lease(&self) -> Option<Job> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let (&priority, _) = state.ready.iter().find(|(_, q)| !q.is_empty())?;
        let job = state.ready.get_mut(&priority)?.pop_front()?;
        state.leased.insert(
            job.order_id.clone(),
            LeasedJob {
                job: job.clone(),
                deadline: Instant::now() + self.config.visibility_timeout,
            },
        );
        let more_ready = state.ready_count() > 0;
        self.publish_depth(&state);
        drop(state);
        if more_ready {
            self.notify.notify_one();
        }
        Some(job)
    }

    /// Acknowledge a job that finished without terminal failure.
    pub fn ack_completed(&self, order_id: &str, outcome: &str) {
        self.finish(order_id, outcome, false);
    }

    /// Acknowledge a job whose order failed terminally.
    pub fn ack_failed(&self, order_id: &str, outcome: &str) {
        self.finish(order_id, outcome, true);
    }

    fn finish(&self, order_id: &str, outcome: &str, failed: bool) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let Some(leased) = state.leased.remove(order_id) else {
            warn!("Ack for unleased job {}", order_id);
            return;
        };
        let record = JobRecord {
            order_id: order_id.to_string(),
            attempts: leased.job.attempt + 1,
            outcome: outcome.to_string(),
            finished_at: Utc::now(),
        };
        if failed {
            state.failed.push_back(record);
            while state.failed.len() > self.config.failed_retention {
                state.failed.pop_front();
            }
        } else {
            state.completed.push_back(record);
            while state.completed.len() > self.config.completed_retention {
                state.completed.pop_front();
            }
        }
        self.publish_depth(&state);
    }

    /// Return a leased job for another attempt after `delay`.
    pub fn nack(&self, order_id: &str, delay: Duration) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let Some(mut leased) = state.leased.remove(order_id) else {
            warn!("Nack for unleased job {}", order_id);
            return;
        };
        leased.job.attempt += 1;
        if delay.is_zero() {
            state
                .ready
                .entry(leased.job.priority)
                .or_default()
                .push_back(leased.job);
            self.publish_depth(&state);
            drop(state);
            self.notify.notify_one();
        } else {
            state.delayed.push(DelayedJob {
                job: leased.job,
                ready_at: Instant::now() + delay,
            });
            self.publish_depth(&state);
        }
    }

    /// Put a leased job back at the head of its queue, attempt untouched.
    ///
    /// Shutdown path: the worker never started the attempt.
    pub fn release(&self, job: Job) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.leased.remove(&job.order_id);
        state.ready.entry(job.priority).or_default().push_front(job);
        self.publish_depth(&state);
        drop(state);
        self.notify.notify_one();
    }

    /// Promote due delayed jobs and re-queue expired leases.
    ///
    /// Called periodically by the janitor task; exposed for tests.
    pub fn housekeep(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().expect("queue lock poisoned");

        let mut due: Vec<Job> = Vec::new();
        state.delayed.retain(|d| {
            if d.ready_at <= now {
                due.push(d.job.clone());
                false
            } else {
                true
            }
        });

        let expired: Vec<String> = state
            .leased
            .iter()
            .filter(|(_, l)| l.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for order_id in expired {
            if let Some(mut leased) = state.leased.remove(&order_id) {
                warn!(
                    "Lease expired for order {} (attempt {}); re-queueing",
                    order_id, leased.job.attempt
                );
                leased.job.attempt += 1;
                due.push(leased.job);
            }
        }

        for job in due {
            state.ready.entry(job.priority).or_default().push_back(job);
        }
        self.publish_depth(&state);
        drop(state);

        // Wake any worker parked on an empty queue; also papers over lost
        // notify permits from cancelled dequeues.
        self.notify.notify_waiters();
    }

    /// Spawn the housekeeping loop.
    pub fn spawn_janitor(
        self: std::sync::Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = self;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(250));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }

                    _ = tick.tick() => {
                        queue.housekeep();
                    }
                }
            }
            info!("Queue janitor stopped");
        })
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock().expect("queue lock poisoned");
        QueueStats {
            ready: state.ready_count(),
            leased: state.leased.len(),
            delayed: state.delayed.len(),
            completed_retained: state.completed.len(),
            failed_retained: state.failed.len(),
        }
    }

    /// Jobs not yet finished (ready + leased + delayed).
    pub fn depth(&self) -> usize {
        let state = self.state.lock().expect("queue lock poisoned");
        state.ready_count() + state.leased.len() + state.delayed.len()
    }

    fn publish_depth(&self, state: &QueueState) {
        gauge!("engine_queue_depth", "state" => "ready").set(state.ready_count() as f64);
        gauge!("engine_queue_depth", "state" => "leased").set(state.leased.len() as f64);
        gauge!("engine_queue_depth", "state" => "delayed").set(state.delayed.len() as f64);
    }
}
