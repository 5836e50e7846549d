//! Lock-protected throughput counters with snapshot reads.

use parking_lot::Mutex;
use serde::Serialize;

use crate::util::serde::Priority;

/// Monotonic counters plus the live running gauge for one priority band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Tasks accepted by the pool.
    pub submitted: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that returned an error or panicked.
    pub failed: u64,
    /// Tasks currently executing.
    pub running: u64,
}

/// Point-in-time copy of all counters, aggregate and per band.
///
/// Returned by value; mutating it has no effect on the tracker.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Statistics {
    /// Aggregate across all bands.
    pub total: Counters,
    /// Per-band breakdown, indexed by `Priority::index`.
    pub per_priority: [Counters; Priority::COUNT],
}

impl Statistics {
    /// Counters for one band.
    #[must_use]
    pub fn for_priority(&self, priority: Priority) -> Counters {
        self.per_priority[priority.index()]
    }
}

/// Concurrency-safe throughput tracker.
///
/// All increments go through one lock so any snapshot is internally
/// consistent. Counters are cleared only at construction. Without the
/// priority queue every submission lands in the `Normal` band.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    bands: Mutex<[Counters; Priority::COUNT]>,
}

impl StatisticsTracker {
    /// Fresh tracker with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted submission.
    pub fn inc_submitted(&self, priority: Priority) {
        self.bands.lock()[priority.index()].submitted += 1;
    }

    /// Record a task starting execution.
    pub fn inc_running(&self, priority: Priority) {
        self.bands.lock()[priority.index()].running += 1;
    }

    /// Record a task leaving execution.
    pub fn dec_running(&self, priority: Priority) {
        let mut bands = self.bands.lock();
        let band = &mut bands[priority.index()];
        band.running = band.running.saturating_sub(1);
    }

    /// Record a successful completion.
    pub fn inc_completed(&self, priority: Priority) {
        self.bands.lock()[priority.index()].completed += 1;
    }

    /// Record a failure (task error or caught fault).
    pub fn inc_failed(&self, priority: Priority) {
        self.bands.lock()[priority.index()].failed += 1;
    }

    /// Snapshot of the current counters, copied under the lock.
    #[must_use]
    pub fn get(&self) -> Statistics {
        let per_priority = *self.bands.lock();
        let mut total = Counters::default();
        for band in &per_priority {
            total.submitted += band.submitted;
            total.completed += band.completed;
            total.failed += band.failed;
            total.running += band.running;
        }
        Statistics { total, per_priority }
    }
}
