//! Named worker pools ("logical lanes").
//!
//! Each pool owns a run queue and a fixed number of worker threads. Tasks
//! carry their pool assignment themselves; waking a task enqueues it onto
//! whatever pool it is currently assigned to, which is how context switches
//! move a task between lanes without changing its identity.

use super::task::{TaskCore, TaskState, task_waker};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

/// Configuration for one lane.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Lane name, e.g. `"interactive"`, `"compute"`, `"blocking-io"`.
    pub name: String,
    /// Number of worker threads.
    pub workers: usize,
}

impl PoolConfig {
    /// A lane with the given name and worker count (minimum one worker).
    #[must_use]
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        Self {
            name: name.into(),
            workers: workers.max(1),
        }
    }
}

/// Run queue shared by the workers of one lane.
pub(crate) struct Pool {
    pub(crate) name: String,
    queue: Mutex<VecDeque<Arc<TaskCore>>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl Pool {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, core: Arc<TaskCore>) {
        let mut queue = self.queue.lock();
        queue.push_back(core);
        drop(queue);
        self.available.notify_one();
    }

    /// Blocks until a task is available or the pool shuts down.
    fn pop(&self) -> Option<Arc<TaskCore>> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(core) = queue.pop_front() {
                return Some(core);
            }
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            self.available.wait(&mut queue);
        }
    }

    pub(crate) fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.available.notify_all();
    }
}

/// Body of every worker thread.
pub(crate) fn run_worker(pool: Arc<Pool>) {
    while let Some(core) = pool.pop() {
        poll_task(&core);
    }
}

/// Polls one task once.
///
/// The future slot stays locked for the duration of the poll; a wake
/// delivered mid-poll enqueues the task again and the next worker simply
/// blocks on the slot until this poll finishes, so no wakeup is lost.
fn poll_task(core: &Arc<TaskCore>) {
    core.clear_scheduled();
    if core.state().is_terminal() {
        return;
    }
    let mut slot = core.future.lock();
    let Some(future) = slot.as_mut() else {
        return;
    };
    let waker = task_waker(core);
    let mut cx = Context::from_waker(&waker);
    match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
        Ok(Poll::Pending) => {}
        Ok(Poll::Ready(())) => {
            // The wrapper future has already finalized the task; drop the
            // body so borrowed resources are released promptly.
            *slot = None;
        }
        Err(_panic) => {
            // Panics from the task body are captured inside the wrapper;
            // reaching this point means the wrapper itself misbehaved.
            *slot = None;
            drop(slot);
            tracing::error!(task = %core.id, "task wrapper panicked; marking failed");
            core.shared.table.finalize(core.id, TaskState::Failed);
            return;
        }
    }
}
