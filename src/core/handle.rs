//! Single-value completion handles for result-bearing submissions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::error::{AppResult, PoolError};

struct Slot<T> {
    outcome: Option<AppResult<T>>,
    completed: bool,
}

struct Shared<T> {
    state: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Completion side held by the pool's task wrapper. Completing it, or
/// dropping it without completing (a task discarded before it ran),
/// resolves the paired handle so waiters are never stranded.
pub(crate) struct Completer<T> {
    shared: Arc<Shared<T>>,
    done: bool,
}

impl<T> Completer<T> {
    pub(crate) fn complete(mut self, outcome: AppResult<T>) {
        self.fill(outcome);
    }

    fn fill(&mut self, outcome: AppResult<T>) {
        if self.done {
            return;
        }
        self.done = true;
        let mut slot = self.shared.state.lock();
        slot.outcome = Some(outcome);
        slot.completed = true;
        drop(slot);
        self.shared.ready.notify_all();
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.done {
            self.fill(Err(
                PoolError::TaskFault("task dropped before execution".into()).into()
            ));
        }
    }
}

/// Waits for the single value produced by a result-bearing submission.
///
/// The outcome can be taken exactly once; subsequent takes return `None`.
pub struct CompletionHandle<T> {
    shared: Arc<Shared<T>>,
}

/// Build a paired completer and handle.
pub(crate) fn completion_pair<T>() -> (Completer<T>, CompletionHandle<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(Slot {
            outcome: None,
            completed: false,
        }),
        ready: Condvar::new(),
    });
    (
        Completer {
            shared: Arc::clone(&shared),
            done: false,
        },
        CompletionHandle { shared },
    )
}

impl<T> CompletionHandle<T> {
    /// Whether the task has finished (successfully or not).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().completed
    }

    /// Take the outcome if it is ready. `None` while the task is still
    /// pending, or once the outcome was already taken.
    pub fn try_take(&self) -> Option<AppResult<T>> {
        self.shared.state.lock().outcome.take()
    }

    /// Block until the outcome is ready or the timeout elapses; `None`
    /// on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AppResult<T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.state.lock();
        while !slot.completed {
            if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.outcome.take()
    }

    /// Block until the task finishes and return its result.
    pub fn wait(self) -> AppResult<T> {
        let mut slot = self.shared.state.lock();
        while !slot.completed {
            self.shared.ready.wait(&mut slot);
        }
        slot.outcome
            .take()
            .unwrap_or_else(|| Err(PoolError::TaskFault("result already taken".into()).into()))
    }
}
