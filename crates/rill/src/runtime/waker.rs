//! Waker plumbing for the executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Wake, Waker};
use std::thread::{self, Thread};

/// Park/unpark notifier for a thread driving a future to completion
/// (used by `Runtime::block_on`).
#[derive(Debug)]
pub(crate) struct ThreadNotify {
    /// The driving thread.
    thread: Thread,
    /// A flag to ensure a wakeup (i.e. `unpark()`) is not "forgotten"
    /// before the next `park()`, which may otherwise happen if the code
    /// being executed as part of the future(s) being polled makes use of
    /// park / unpark calls of its own, i.e. we cannot assume that no other
    /// code uses park / unpark on the executing `thread`.
    unparked: AtomicBool,
}

impl ThreadNotify {
    pub(crate) fn current() -> Self {
        Self {
            thread: thread::current(),
            unparked: AtomicBool::new(false),
        }
    }

    /// Consumes a pending wakeup, reporting whether one had been delivered.
    pub(crate) fn take_wakeup(&self) -> bool {
        self.unparked.swap(false, Ordering::Acquire)
    }
}

impl Wake for ThreadNotify {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let unparked = self.unparked.swap(true, Ordering::Release);
        if !unparked {
            // If the thread has not been unparked yet, it must be done
            // now. If it was actually parked, it will run again,
            // otherwise the token made available by `unpark`
            // may be consumed before reaching `park()`, but `unparked`
            // ensures it is not forgotten.
            self.thread.unpark();
        }
    }
}

pub(crate) fn thread_waker(notify: &Arc<ThreadNotify>) -> Waker {
    Waker::from(notify.clone())
}
