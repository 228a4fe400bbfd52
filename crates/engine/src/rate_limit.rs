//! Rolling-window rate limiter for job starts.
//!
//! Keeps the start timestamps inside the window; an acquire that would
//! exceed the budget sleeps until the oldest start rolls out. Monotonic
//! clock only.

use metrics::counter;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Process-wide rolling-window limiter.
pub struct RollingRateLimiter {
    max_per_window: u32,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RollingRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    /// Take one start permit, waiting as long as the window is full.
    pub async fn acquire(&self) {
        loop {
            let now = Instant::now();
            let mut starts = self.starts.lock().await;
            while let Some(front) = starts.front().copied() {
                if now.duration_since(front) >= self.window {
                    starts.pop_front();
                } else {
                    break;
                }
            }
            if starts.len() < self.max_per_window as usize {
                starts.push_back(now);
                return;
            }
            let wait = starts
                .front()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(Duration::from_millis(0));
            drop(starts);
            counter!("engine_rate_limit_waits_total").increment(1);
            tokio::time::sleep(wait).await;
        }
    }

    /// Starts currently inside the window.
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        let starts = self.starts.lock().await;
        starts
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}
