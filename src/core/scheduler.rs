//! Priority dispatch: decouples accepted work from executor capacity.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::core::executor::{Executor, Job, TrySubmitError};
use crate::core::queue::{PendingQueue, QueuedTask};
use crate::util::serde::Priority;

/// Pause before retrying dispatch against a saturated executor. Bounds
/// the dispatch delay instead of starving the loop on a busy executor.
const DISPATCH_BACKOFF: Duration = Duration::from_millis(10);

/// Priority queue plus the dispatch loop feeding the executor.
///
/// Enqueue never blocks the caller: backpressure shifts to queue growth.
/// The configured depth is advisory only; under sustained overload the
/// queue grows past it and a warning is logged. There is no priority
/// aging, so a continuous stream of high-priority tasks starves lower
/// bands indefinitely.
pub struct PriorityScheduler {
    queue: Mutex<PendingQueue>,
    seq: AtomicU64,
    /// Single-slot wake channel: enqueues while the dispatch loop is
    /// already awake coalesce into one pending wakeup.
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    advisory_depth: usize,
    over_advisory: AtomicBool,
}

impl PriorityScheduler {
    /// Create a scheduler with the given advisory queue depth.
    #[must_use]
    pub fn new(advisory_depth: usize) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            queue: Mutex::new(PendingQueue::new()),
            seq: AtomicU64::new(0),
            wake_tx,
            wake_rx,
            advisory_depth,
            over_advisory: AtomicBool::new(false),
        }
    }

    /// Queue a task for dispatch. Non-blocking; O(log n).
    pub fn enqueue(&self, priority: Priority, job: Job) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let depth = {
            let mut queue = self.queue.lock();
            queue.push(QueuedTask {
                priority,
                seq,
                enqueued_at: Instant::now(),
                job,
            });
            queue.len()
        };
        self.note_depth(depth);
        let _ = self.wake_tx.try_send(());
    }

    fn note_depth(&self, depth: usize) {
        if depth > self.advisory_depth {
            if !self.over_advisory.swap(true, Ordering::Relaxed) {
                warn!(
                    depth,
                    advisory = self.advisory_depth,
                    "queue depth exceeded advisory bound; growth is unbounded"
                );
            }
        } else if depth < self.advisory_depth / 2 {
            self.over_advisory.store(false, Ordering::Relaxed);
        }
    }

    /// Pending tasks not yet handed to the executor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Discard all pending tasks, returning how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        self.queue.lock().clear()
    }

    /// Dispatch loop body; runs on a dedicated thread until shutdown.
    pub(crate) fn run_dispatch(&self, executor: &Executor, shutdown_rx: &Receiver<()>) {
        debug!("dispatch loop started");
        loop {
            select! {
                recv(self.wake_rx) -> _ => {}
                recv(shutdown_rx) -> _ => break,
            }
            self.drain(executor, shutdown_rx);
        }
        debug!("dispatch loop exiting");
    }

    /// Pop and submit ready tasks until the queue empties or the executor
    /// saturates. Saturation pauses dispatch for a fixed backoff and
    /// re-arms the wake signal so the retry does not depend on another
    /// enqueue.
    fn drain(&self, executor: &Executor, shutdown_rx: &Receiver<()>) {
        loop {
            let Some(task) = self.queue.lock().pop() else {
                return;
            };
            let QueuedTask {
                priority,
                seq,
                enqueued_at,
                job,
            } = task;
            match executor.try_submit(job) {
                Ok(()) => {
                    trace!(
                        priority = %priority,
                        seq,
                        queued_ms = enqueued_at.elapsed().as_millis() as u64,
                        "task dispatched"
                    );
                }
                Err(TrySubmitError::Saturated(job)) => {
                    self.queue.lock().push(QueuedTask {
                        priority,
                        seq,
                        enqueued_at,
                        job,
                    });
                    debug!("executor saturated; dispatch backing off");
                    if matches!(
                        shutdown_rx.recv_timeout(DISPATCH_BACKOFF),
                        Err(RecvTimeoutError::Timeout)
                    ) {
                        let _ = self.wake_tx.try_send(());
                    }
                    return;
                }
                Err(TrySubmitError::Closed(_)) => {
                    debug!("executor closed; dispatch stopping");
                    return;
                }
            }
        }
    }
}
