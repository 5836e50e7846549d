//! Pool facade composing the executor, priority scheduler, metrics
//! collector, and autoscaler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::PoolConfig;
use crate::core::autoscaler::AutoScaler;
use crate::core::error::{AppResult, PoolError};
use crate::core::executor::{Executor, Job};
use crate::core::handle::{completion_pair, CompletionHandle};
use crate::core::metrics::{MetricsCollector, MetricsSnapshot};
use crate::core::scheduler::PriorityScheduler;
use crate::core::stats::{Statistics, StatisticsTracker};
use crate::util::serde::Priority;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Adaptive worker pool: bounded executor, optional priority queue, and
/// optional feedback-driven autoscaling behind one facade.
///
/// Constructed once from a [`PoolConfig`]; all background loops start at
/// construction and stop at [`Pool::shutdown`]. The pool is an owned
/// instance with no global state; share it behind an `Arc` as needed.
pub struct Pool {
    config: PoolConfig,
    executor: Arc<Executor>,
    stats: Arc<StatisticsTracker>,
    scheduler: Option<Arc<PriorityScheduler>>,
    metrics: Arc<MetricsCollector>,
    autoscaler: Option<Arc<AutoScaler>>,
    /// Dropping this sender is the shared stop signal for every
    /// background loop.
    shutdown_tx: Mutex<Option<Sender<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    /// Serializes shutdown so concurrent callers all block until drained.
    shutdown_done: Mutex<bool>,
}

impl Pool {
    /// Construct a pool and start its background machinery.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when validation fails; `Spawn` when the thread
    /// pool cannot be created.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let executor = Arc::new(Executor::new(config.initial_workers)?);
        let stats = Arc::new(StatisticsTracker::new());
        let scheduler = config
            .enable_priority
            .then(|| Arc::new(PriorityScheduler::new(config.queue_size)));
        let metrics = Arc::new(MetricsCollector::new(
            Arc::clone(&executor),
            scheduler.clone(),
            Arc::clone(&stats),
        ));
        let autoscaler = config.autoscaling.enabled.then(|| {
            Arc::new(AutoScaler::new(
                config.autoscaling.clone(),
                Arc::clone(&executor),
                Arc::clone(&metrics),
                config.initial_workers,
            ))
        });

        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let mut background = Vec::new();

        if let Some(scheduler) = &scheduler {
            let scheduler = Arc::clone(scheduler);
            let executor = Arc::clone(&executor);
            let rx = shutdown_rx.clone();
            background.push(
                thread::Builder::new()
                    .name("workpool-dispatch".into())
                    .spawn(move || scheduler.run_dispatch(&executor, &rx))?,
            );
        }
        {
            let metrics = Arc::clone(&metrics);
            let rx = shutdown_rx.clone();
            background.push(
                thread::Builder::new()
                    .name("workpool-metrics".into())
                    .spawn(move || metrics.run(&rx))?,
            );
        }
        if let Some(autoscaler) = &autoscaler {
            let autoscaler = Arc::clone(autoscaler);
            let rx = shutdown_rx.clone();
            background.push(
                thread::Builder::new()
                    .name("workpool-autoscale".into())
                    .spawn(move || autoscaler.run(&rx))?,
            );
        }

        info!(
            initial_workers = config.initial_workers,
            priority = config.enable_priority,
            autoscaling = config.autoscaling.enabled,
            "pool started"
        );

        Ok(Self {
            config,
            executor,
            stats,
            scheduler,
            metrics,
            autoscaler,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            background: Mutex::new(background),
            closed: AtomicBool::new(false),
            shutdown_done: Mutex::new(false),
        })
    }

    /// The configuration this pool was built from.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Submit a fire-and-forget task in the `Normal` band.
    ///
    /// With priority mode off the call blocks while every worker is
    /// busy; with priority mode on it queues and returns immediately.
    ///
    /// # Errors
    ///
    /// `PoolClosed` after shutdown.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_with_priority(Priority::Normal, task)
    }

    /// Submit a fire-and-forget task in a priority band.
    ///
    /// Without the priority queue enabled this degrades to a plain
    /// blocking submission counted under `Normal`.
    ///
    /// # Errors
    ///
    /// `PoolClosed` after shutdown.
    pub fn submit_with_priority<F>(&self, priority: Priority, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolClosed);
        }
        match &self.scheduler {
            Some(scheduler) => {
                self.stats.inc_submitted(priority);
                scheduler.enqueue(priority, self.instrument(priority, task));
                Ok(())
            }
            None => {
                let priority = Priority::Normal;
                self.stats.inc_submitted(priority);
                if let Err(err) = self.executor.submit(self.instrument(priority, task)) {
                    self.stats.inc_failed(priority);
                    return Err(err);
                }
                Ok(())
            }
        }
    }

    /// Submit a task producing a value. The returned handle resolves to
    /// the task's own result; a panic inside the body is logged,
    /// converted to [`PoolError::TaskFault`], and delivered through the
    /// handle instead of unwinding past the worker.
    ///
    /// # Errors
    ///
    /// `PoolClosed` after shutdown.
    pub fn submit_with_result<T, F>(&self, task: F) -> Result<CompletionHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolClosed);
        }
        let (completer, handle) = completion_pair::<T>();
        let stats = Arc::clone(&self.stats);
        let priority = Priority::Normal;
        let job: Job = Box::new(move || {
            stats.inc_running(priority);
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            stats.dec_running(priority);
            match outcome {
                Ok(result) => {
                    if result.is_ok() {
                        stats.inc_completed(priority);
                    } else {
                        stats.inc_failed(priority);
                    }
                    completer.complete(result);
                }
                Err(payload) => {
                    stats.inc_failed(priority);
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "task fault caught at worker boundary");
                    completer.complete(Err(PoolError::TaskFault(message).into()));
                }
            }
        });

        self.stats.inc_submitted(priority);
        match &self.scheduler {
            Some(scheduler) => scheduler.enqueue(priority, job),
            None => {
                if let Err(err) = self.executor.submit(job) {
                    self.stats.inc_failed(priority);
                    return Err(err);
                }
            }
        }
        Ok(handle)
    }

    /// Wrap a task body with statistics accounting and fault capture.
    fn instrument<F>(&self, priority: Priority, task: F) -> Job
    where
        F: FnOnce() + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        Box::new(move || {
            stats.inc_running(priority);
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            stats.dec_running(priority);
            match outcome {
                Ok(()) => stats.inc_completed(priority),
                Err(payload) => {
                    stats.inc_failed(priority);
                    error!(
                        priority = %priority,
                        panic = %panic_message(payload.as_ref()),
                        "task fault caught at worker boundary"
                    );
                }
            }
        })
    }

    /// Snapshot of throughput counters.
    #[must_use]
    pub fn stats(&self) -> Statistics {
        self.stats.get()
    }

    /// Most recent metrics sample.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.latest()
    }

    /// The metrics collector, for history queries or forced samples.
    #[must_use]
    pub fn metrics_collector(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// The autoscaler, when enabled.
    #[must_use]
    pub fn autoscaler(&self) -> Option<&AutoScaler> {
        self.autoscaler.as_deref()
    }

    /// Queued-but-undispatched tasks (0 with priority mode off).
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.scheduler.as_ref().map_or(0, |s| s.len())
    }

    /// Current executor capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.executor.capacity()
    }

    /// Busy workers at this instant.
    #[must_use]
    pub fn running(&self) -> usize {
        self.executor.running()
    }

    /// Operator-driven resize, bounds-checked and exempt from the
    /// autoscaler's cooldown.
    ///
    /// # Errors
    ///
    /// `InvalidScaleTarget` when autoscaling is disabled or the target is
    /// outside `[min_workers, max_workers]`; `PoolClosed` after shutdown.
    pub fn manual_scale(&self, new_size: usize) -> Result<(), PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolClosed);
        }
        match &self.autoscaler {
            Some(autoscaler) => autoscaler.manual_scale(new_size),
            None => Err(PoolError::InvalidScaleTarget(
                "autoscaling is disabled".into(),
            )),
        }
    }

    /// Stop accepting work, stop the background loops, and drain
    /// in-flight tasks. Blocking and idempotent; concurrent callers all
    /// return only once the pool is fully drained.
    ///
    /// Tasks still waiting in the priority queue are dropped; their
    /// completion handles resolve with a `TaskFault` error.
    pub fn shutdown(&self) {
        let mut done = self.shutdown_done.lock();
        if *done {
            return;
        }
        self.closed.store(true, Ordering::Release);
        *self.shutdown_tx.lock() = None;
        let background: Vec<JoinHandle<()>> = self.background.lock().drain(..).collect();
        for handle in background {
            if handle.join().is_err() {
                error!("background thread panicked during shutdown");
            }
        }
        if let Some(scheduler) = &self.scheduler {
            let dropped = scheduler.clear();
            if dropped > 0 {
                debug!(dropped, "queued tasks dropped at shutdown");
            }
        }
        self.executor.shutdown();
        *done = true;
        info!("pool shut down");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Signal without joining; explicit shutdown() is the graceful
        // path. This mirrors the executor's own drop behavior so a
        // dropped pool cannot hang its owner.
        if !self.closed.swap(true, Ordering::AcqRel) {
            *self.shutdown_tx.lock() = None;
            debug!("pool dropped without explicit shutdown");
        }
    }
}
