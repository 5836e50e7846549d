//! Feedback-driven capacity controller.
//!
//! Reads the metrics collector's latest snapshot on a fixed tick and
//! resizes the executor, with a cooldown against oscillation and an
//! optional linear-regression trend trigger.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::AutoScalingConfig;
use crate::core::error::PoolError;
use crate::core::executor::Executor;
use crate::core::metrics::MetricsCollector;

/// Interval between scaling evaluations.
pub(crate) const EVALUATE_INTERVAL: Duration = Duration::from_secs(5);

/// Queue-length samples fed to the trend regression.
const REGRESSION_WINDOW: usize = 10;

/// Step override once the backlog passes twice the threshold.
const SURGE_STEP: usize = 20;

/// Step override once the backlog passes three times the threshold.
const FLOOD_STEP: usize = 50;

/// Scaling state, mutated only under its lock.
#[derive(Debug, Clone, Copy)]
pub struct ScalingState {
    /// Capacity last requested from the executor.
    pub current_workers: usize,
    /// When the last scaling action took effect.
    pub last_scale_at: Option<Instant>,
}

/// Periodic controller resizing the executor from observed load.
pub struct AutoScaler {
    cfg: AutoScalingConfig,
    executor: Arc<Executor>,
    metrics: Arc<MetricsCollector>,
    state: Mutex<ScalingState>,
}

impl AutoScaler {
    pub(crate) fn new(
        cfg: AutoScalingConfig,
        executor: Arc<Executor>,
        metrics: Arc<MetricsCollector>,
        initial_workers: usize,
    ) -> Self {
        Self {
            cfg,
            executor,
            metrics,
            state: Mutex::new(ScalingState {
                current_workers: initial_workers,
                last_scale_at: None,
            }),
        }
    }

    /// Snapshot of the scaling state.
    #[must_use]
    pub fn state(&self) -> ScalingState {
        *self.state.lock()
    }

    /// One evaluation tick: read the latest snapshot, decide, resize.
    /// First matching rule wins; the cooldown gates every automatic
    /// action.
    pub fn evaluate(&self) {
        // Held across the whole read-decide-resize sequence so a manual
        // scale cannot interleave with an automatic one.
        let mut state = self.state.lock();
        if let Some(last) = state.last_scale_at {
            if last.elapsed() < self.cfg.cooldown() {
                trace!("scaling evaluation skipped: cooldown active");
                return;
            }
        }

        let snapshot = self.metrics.latest();
        let utilization = if snapshot.total_workers == 0 {
            0.0
        } else {
            snapshot.running_workers as f64 / snapshot.total_workers as f64
        };
        let queue_length = snapshot.queue_length;
        let threshold = self.cfg.scale_up_queue_threshold;

        if queue_length > threshold {
            self.scale_up(&mut state, queue_length, "queue backlog");
        } else if utilization > self.cfg.scale_up_utilization {
            self.scale_up(&mut state, queue_length, "high utilization");
        } else if self.cfg.enable_predictive
            && predict_next(&self.metrics.recent_queue_lengths(REGRESSION_WINDOW))
                > threshold as f64
        {
            self.scale_up(&mut state, queue_length, "predicted backlog");
        } else if utilization < self.cfg.scale_down_utilization
            && queue_length < threshold / 2
            && state.current_workers > self.cfg.min_workers
        {
            self.scale_down(&mut state);
        } else {
            trace!(queue_length, utilization, "no scaling action");
        }
    }

    fn scale_up(&self, state: &mut ScalingState, queue_length: usize, reason: &str) {
        let threshold = self.cfg.scale_up_queue_threshold;
        // Step tiered by backlog severity.
        let step = if queue_length > 3 * threshold {
            FLOOD_STEP
        } else if queue_length > 2 * threshold {
            SURGE_STEP
        } else {
            self.cfg.scale_up_step
        };
        let target = (state.current_workers + step).min(self.cfg.max_workers);
        if target == state.current_workers {
            trace!(reason, "scale up is a no-op at max capacity");
            return;
        }
        match self.executor.resize(target) {
            Ok(()) => {
                info!(
                    from = state.current_workers,
                    to = target,
                    queue_length,
                    reason,
                    "scaled up"
                );
                state.current_workers = target;
                state.last_scale_at = Some(Instant::now());
            }
            Err(err) => warn!(%err, target, "scale up failed"),
        }
    }

    fn scale_down(&self, state: &mut ScalingState) {
        let target = state
            .current_workers
            .saturating_sub(self.cfg.scale_down_step)
            .max(self.cfg.min_workers);
        if target == state.current_workers {
            return;
        }
        match self.executor.resize(target) {
            Ok(()) => {
                info!(from = state.current_workers, to = target, "scaled down");
                state.current_workers = target;
                state.last_scale_at = Some(Instant::now());
            }
            Err(err) => warn!(%err, target, "scale down failed"),
        }
    }

    /// Operator-driven resize. Bounds-checked against the configured
    /// range and exempt from the cooldown gate; on success it still
    /// updates the cooldown timestamp.
    ///
    /// # Errors
    ///
    /// `InvalidScaleTarget` when `new_size` lies outside
    /// `[min_workers, max_workers]`.
    pub fn manual_scale(&self, new_size: usize) -> Result<(), PoolError> {
        if new_size < self.cfg.min_workers || new_size > self.cfg.max_workers {
            return Err(PoolError::InvalidScaleTarget(format!(
                "{new_size} outside [{}, {}]",
                self.cfg.min_workers, self.cfg.max_workers
            )));
        }
        let mut state = self.state.lock();
        self.executor.resize(new_size)?;
        info!(from = state.current_workers, to = new_size, "manual scale");
        state.current_workers = new_size;
        state.last_scale_at = Some(Instant::now());
        Ok(())
    }

    /// Evaluation loop; runs on a dedicated thread until shutdown.
    pub(crate) fn run(&self, shutdown_rx: &Receiver<()>) {
        debug!("autoscaler started");
        loop {
            match shutdown_rx.recv_timeout(EVALUATE_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => self.evaluate(),
                _ => break,
            }
        }
        debug!("autoscaler exiting");
    }
}

/// Least-squares linear fit over the samples, extrapolated one step
/// ahead. Negative projections clamp to zero; a history too short to fit
/// returns the last sample unchanged. Deliberately has no confidence
/// interval or outlier rejection.
#[must_use]
pub fn predict_next(samples: &[usize]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return samples.last().copied().unwrap_or(0) as f64;
    }
    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|x| x as f64).sum();
    let sum_y: f64 = samples.iter().map(|&y| y as f64).sum();
    let sum_xy: f64 = samples
        .iter()
        .enumerate()
        .map(|(x, &y)| x as f64 * y as f64)
        .sum();
    let sum_x2: f64 = (0..n).map(|x| (x * x) as f64).sum();
    let denom = n_f * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return samples[n - 1] as f64;
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    (slope * n_f + intercept).max(0.0)
}
