//! Periodic load sampling for the autoscaling controller.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::core::executor::Executor;
use crate::core::scheduler::PriorityScheduler;
use crate::core::stats::{Statistics, StatisticsTracker};
use crate::util::clock;

/// Interval between periodic samples.
pub(crate) const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Queue-length samples retained for trend prediction; the oldest is
/// evicted first.
pub const HISTORY_CAPACITY: usize = 60;

/// Point-in-time view of pool load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Tasks queued but not yet dispatched (0 with priority mode off).
    pub queue_length: usize,
    /// Current executor capacity.
    pub total_workers: usize,
    /// Busy workers.
    pub running_workers: usize,
    /// `total_workers - running_workers`.
    pub idle_workers: usize,
    /// Cumulative throughput counters at sample time.
    pub stats: Statistics,
    /// Wall-clock sample time, milliseconds since the Unix epoch.
    pub sampled_at_ms: u128,
}

struct MetricsState {
    latest: MetricsSnapshot,
    queue_history: VecDeque<usize>,
    max_queue_length: usize,
}

/// Samples queue depth and utilization on a fixed tick into a bounded
/// sliding window, and tracks a high-water mark that never decreases.
pub struct MetricsCollector {
    executor: Arc<Executor>,
    scheduler: Option<Arc<PriorityScheduler>>,
    stats: Arc<StatisticsTracker>,
    state: Mutex<MetricsState>,
}

impl MetricsCollector {
    pub(crate) fn new(
        executor: Arc<Executor>,
        scheduler: Option<Arc<PriorityScheduler>>,
        stats: Arc<StatisticsTracker>,
    ) -> Self {
        Self {
            executor,
            scheduler,
            stats,
            state: Mutex::new(MetricsState {
                latest: MetricsSnapshot::default(),
                queue_history: VecDeque::with_capacity(HISTORY_CAPACITY),
                max_queue_length: 0,
            }),
        }
    }

    /// Take a sample immediately, outside the periodic tick.
    pub fn sample_now(&self) -> MetricsSnapshot {
        let queue_length = self.scheduler.as_ref().map_or(0, |s| s.len());
        let total_workers = self.executor.capacity();
        let running_workers = self.executor.running();
        let snapshot = MetricsSnapshot {
            queue_length,
            total_workers,
            running_workers,
            idle_workers: total_workers.saturating_sub(running_workers),
            stats: self.stats.get(),
            sampled_at_ms: clock::now_ms(),
        };

        let mut state = self.state.lock();
        if state.queue_history.len() == HISTORY_CAPACITY {
            state.queue_history.pop_front();
        }
        state.queue_history.push_back(queue_length);
        if queue_length > state.max_queue_length {
            state.max_queue_length = queue_length;
        }
        state.latest = snapshot.clone();
        drop(state);

        trace!(queue_length, running_workers, total_workers, "metrics sampled");
        snapshot
    }

    /// Most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> MetricsSnapshot {
        self.state.lock().latest.clone()
    }

    /// Up to `n` most recent queue-length samples, oldest first.
    #[must_use]
    pub fn recent_queue_lengths(&self, n: usize) -> Vec<usize> {
        let state = self.state.lock();
        let skip = state.queue_history.len().saturating_sub(n);
        state.queue_history.iter().skip(skip).copied().collect()
    }

    /// High-water mark of observed queue length; never decreases.
    #[must_use]
    pub fn max_queue_length(&self) -> usize {
        self.state.lock().max_queue_length
    }

    /// Collection loop; runs on a dedicated thread until shutdown.
    pub(crate) fn run(&self, shutdown_rx: &Receiver<()>) {
        debug!("metrics collector started");
        loop {
            match shutdown_rx.recv_timeout(SAMPLE_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => {
                    self.sample_now();
                }
                _ => break,
            }
        }
        debug!("metrics collector exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> MetricsCollector {
        let executor = Arc::new(Executor::new(2).unwrap());
        let stats = Arc::new(StatisticsTracker::new());
        MetricsCollector::new(executor, None, stats)
    }

    #[test]
    fn test_sample_reflects_executor() {
        let metrics = collector();
        let snapshot = metrics.sample_now();
        assert_eq!(snapshot.total_workers, 2);
        assert_eq!(snapshot.running_workers, 0);
        assert_eq!(snapshot.idle_workers, 2);
        assert_eq!(snapshot.queue_length, 0);
        assert!(snapshot.sampled_at_ms > 0);
        assert_eq!(metrics.latest().total_workers, 2);
    }

    #[test]
    fn test_queue_length_from_scheduler() {
        let executor = Arc::new(Executor::new(1).unwrap());
        let scheduler = Arc::new(PriorityScheduler::new(100));
        let stats = Arc::new(StatisticsTracker::new());
        let metrics = MetricsCollector::new(executor, Some(Arc::clone(&scheduler)), stats);

        for _ in 0..3 {
            scheduler.enqueue(crate::util::serde::Priority::Normal, Box::new(|| {}));
        }
        let snapshot = metrics.sample_now();
        assert_eq!(snapshot.queue_length, 3);
        assert_eq!(metrics.max_queue_length(), 3);
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let metrics = collector();
        for _ in 0..(HISTORY_CAPACITY + 10) {
            metrics.sample_now();
        }
        let history = metrics.recent_queue_lengths(HISTORY_CAPACITY + 10);
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_recent_window_takes_tail() {
        let executor = Arc::new(Executor::new(1).unwrap());
        let scheduler = Arc::new(PriorityScheduler::new(1_000));
        let stats = Arc::new(StatisticsTracker::new());
        let metrics = MetricsCollector::new(executor, Some(Arc::clone(&scheduler)), stats);

        for batch in 0..4 {
            for _ in 0..batch {
                scheduler.enqueue(crate::util::serde::Priority::Normal, Box::new(|| {}));
            }
            metrics.sample_now();
        }
        // Depths were 0, 1, 3, 6.
        assert_eq!(metrics.recent_queue_lengths(2), vec![3, 6]);
        assert_eq!(metrics.max_queue_length(), 6);
    }
}
