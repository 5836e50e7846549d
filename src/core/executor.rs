//! Bounded, resizable executor running tasks on reusable worker threads.
//!
//! Workers block on a crossbeam channel for hand-off (no polling) and the
//! sender is dropped on shutdown so idle workers unblock naturally. A
//! shrink never interrupts a running task: surplus workers retire as they
//! become idle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::core::error::PoolError;

/// An opaque zero-argument unit of work. Ownership transfers to the
/// executor on submission and ends at completion.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Message delivered to worker threads.
enum WorkerMessage {
    /// Run a task.
    Run(Job),
    /// Retirement hint after a shrink; ignored once capacity is met again.
    Retire,
}

/// Outcome of a non-blocking submission attempt. The job is handed back
/// so the caller can re-queue it.
pub enum TrySubmitError {
    /// Every slot is busy; try again later. Not an error condition.
    Saturated(Job),
    /// The executor is shut down.
    Closed(Job),
}

impl std::fmt::Debug for TrySubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saturated(_) => f.write_str("Saturated(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

struct ExecState {
    /// Maximum concurrently running tasks.
    capacity: usize,
    /// Reserved running slots (busy workers plus jobs in hand-off).
    running: usize,
    /// Live worker threads. Always >= running; may exceed `capacity`
    /// transiently after a shrink until surplus workers retire.
    workers: usize,
    shutdown: bool,
    /// Monotonic id for worker thread names.
    next_worker_id: usize,
}

struct ExecutorInner {
    state: Mutex<ExecState>,
    /// Signaled when a running slot frees or capacity grows.
    slot_freed: Condvar,
    /// Job hand-off. Option so shutdown can drop the sender and let
    /// workers drain the channel and exit.
    job_tx: Mutex<Option<Sender<WorkerMessage>>>,
    /// Kept alive here so a hand-off can never observe a dead channel;
    /// cloned into each spawned worker.
    job_rx: Receiver<WorkerMessage>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Bounded pool of reusable worker threads with dynamic resizing.
///
/// `submit` blocks the caller while all slots are busy; `try_submit` is
/// the non-blocking variant used by the priority dispatch loop. A fault
/// inside a task is caught at the per-task boundary and the worker
/// returns to idle.
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    /// Create an executor and eagerly spawn `capacity` workers.
    ///
    /// # Errors
    ///
    /// `InvalidScaleTarget` when `capacity` is zero; `Spawn` when the OS
    /// refuses a worker thread.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidScaleTarget(
                "capacity must be at least 1".into(),
            ));
        }
        let (job_tx, job_rx) = unbounded();
        let inner = Arc::new(ExecutorInner {
            state: Mutex::new(ExecState {
                capacity,
                running: 0,
                workers: 0,
                shutdown: false,
                next_worker_id: 0,
            }),
            slot_freed: Condvar::new(),
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            handles: Mutex::new(Vec::new()),
        });
        let executor = Self { inner };
        {
            let mut state = executor.inner.state.lock();
            executor.spawn_workers(&mut state, capacity)?;
        }
        debug!(capacity, "executor started");
        Ok(executor)
    }

    /// Spawn `count` workers. The state lock must be held by the caller.
    fn spawn_workers(&self, state: &mut ExecState, count: usize) -> Result<(), PoolError> {
        for _ in 0..count {
            let worker_id = state.next_worker_id;
            state.next_worker_id += 1;
            let inner = Arc::clone(&self.inner);
            let rx = self.inner.job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("workpool-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &inner, &rx))?;
            self.inner.handles.lock().push(handle);
            state.workers += 1;
        }
        Ok(())
    }

    /// Submit a task, blocking the caller while every slot is busy.
    ///
    /// # Errors
    ///
    /// `PoolClosed` once the executor is shut down; checked before and
    /// after every wait so a blocked caller is released by shutdown.
    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        let mut state = self.inner.state.lock();
        loop {
            if state.shutdown {
                return Err(PoolError::PoolClosed);
            }
            if state.running < state.capacity {
                break;
            }
            self.inner.slot_freed.wait(&mut state);
        }
        state.running += 1;
        drop(state);
        match self.hand_off(job) {
            Ok(()) => Ok(()),
            Err(_job) => Err(PoolError::PoolClosed),
        }
    }

    /// Non-blocking submission. On saturation or shutdown the job comes
    /// back inside the error so the caller can re-queue it.
    pub fn try_submit(&self, job: Job) -> Result<(), TrySubmitError> {
        let mut state = self.inner.state.lock();
        if state.shutdown {
            drop(state);
            return Err(TrySubmitError::Closed(job));
        }
        if state.running >= state.capacity {
            drop(state);
            return Err(TrySubmitError::Saturated(job));
        }
        state.running += 1;
        drop(state);
        self.hand_off(job).map_err(TrySubmitError::Closed)
    }

    /// Send a reserved job to the workers. On a closed hand-off the
    /// reservation is released and the job handed back.
    fn hand_off(&self, job: Job) -> Result<(), Job> {
        let tx_guard = self.inner.job_tx.lock();
        let Some(tx) = tx_guard.as_ref() else {
            drop(tx_guard);
            self.release_slot();
            return Err(job);
        };
        // `job_rx` lives in `inner`, so the channel always has a receiver
        // and this send cannot fail.
        let _ = tx.send(WorkerMessage::Run(job));
        Ok(())
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.running = state.running.saturating_sub(1);
        drop(state);
        self.inner.slot_freed.notify_one();
    }

    /// Change the maximum concurrency, effective immediately for future
    /// scheduling. Running tasks are never interrupted; on shrink,
    /// surplus workers retire as they become idle.
    ///
    /// # Errors
    ///
    /// `InvalidScaleTarget` for a zero target, `PoolClosed` after
    /// shutdown, `Spawn` when a grow cannot spawn its workers.
    pub fn resize(&self, new_capacity: usize) -> Result<(), PoolError> {
        if new_capacity == 0 {
            return Err(PoolError::InvalidScaleTarget(
                "capacity must be at least 1".into(),
            ));
        }
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(PoolError::PoolClosed);
        }
        let old = state.capacity;
        if new_capacity == old {
            return Ok(());
        }
        state.capacity = new_capacity;
        if new_capacity > old {
            let missing = new_capacity.saturating_sub(state.workers);
            if missing > 0 {
                self.spawn_workers(&mut state, missing)?;
            }
            drop(state);
            // Blocked submitters may now reserve the new slots.
            self.inner.slot_freed.notify_all();
        } else {
            let surplus = state.workers.saturating_sub(new_capacity);
            drop(state);
            let tx_guard = self.inner.job_tx.lock();
            if let Some(tx) = tx_guard.as_ref() {
                for _ in 0..surplus {
                    let _ = tx.send(WorkerMessage::Retire);
                }
            }
        }
        debug!(old, new = new_capacity, "executor capacity changed");
        Ok(())
    }

    /// Number of tasks currently running (or in hand-off to a worker).
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Free slots at this instant.
    #[must_use]
    pub fn free(&self) -> usize {
        let state = self.inner.state.lock();
        state.capacity.saturating_sub(state.running)
    }

    /// Current maximum concurrency.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    /// Stop accepting submissions and wait for in-flight tasks to finish.
    ///
    /// Jobs already handed off still run; workers exit once the channel
    /// drains. Blocked submitters are released with `PoolClosed`.
    /// Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
        }
        self.inner.slot_freed.notify_all();
        {
            let mut tx = self.inner.job_tx.lock();
            *tx = None;
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.inner.handles.lock();
            guard.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        debug!("executor shut down");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Signal shutdown but do not join: explicit shutdown() is the
        // graceful path; a dropped executor detaches its workers.
        let mut state = self.inner.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            drop(state);
            self.inner.slot_freed.notify_all();
            *self.inner.job_tx.lock() = None;
            debug!("executor dropped without explicit shutdown; workers detached");
        }
    }
}

fn worker_loop(worker_id: usize, inner: &Arc<ExecutorInner>, rx: &Receiver<WorkerMessage>) {
    debug!(worker_id, "worker thread started");
    loop {
        let message = match rx.recv() {
            Ok(message) => message,
            // Channel closed and drained: clean exit.
            Err(_) => break,
        };
        match message {
            WorkerMessage::Run(job) => {
                // Per-task fault boundary: a panicking task never takes
                // the worker down with it.
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(worker_id, "task panicked; worker recovering");
                }
                let mut state = inner.state.lock();
                state.running = state.running.saturating_sub(1);
                let retire = state.workers > state.capacity;
                if retire {
                    state.workers -= 1;
                }
                drop(state);
                inner.slot_freed.notify_one();
                if retire {
                    debug!(worker_id, "worker retired after shrink");
                    break;
                }
            }
            WorkerMessage::Retire => {
                let mut state = inner.state.lock();
                if state.workers > state.capacity {
                    state.workers -= 1;
                    drop(state);
                    debug!(worker_id, "worker retired after shrink");
                    break;
                }
                // Stale retirement hint; capacity was raised again.
            }
        }
    }
    debug!(worker_id, "worker thread exiting");
}
