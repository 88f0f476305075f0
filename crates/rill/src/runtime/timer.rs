//! Deadline-heap timer driver.
//!
//! A dedicated thread sleeps until the earliest registered deadline and
//! wakes the owners of every entry that has come due. Entries are shared
//! with their [`Sleep`](crate::time::Sleep) futures so a re-poll can swap
//! in a fresh waker without touching the heap.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;
use std::time::Instant;

/// One registered deadline, shared between the heap and a `Sleep` future.
#[derive(Debug)]
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    seq: u64,
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl TimerEntry {
    pub(crate) fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub(crate) fn set_waker(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        if self.fired.load(Ordering::Acquire) {
            drop(slot);
            waker.wake_by_ref();
            return;
        }
        match slot.as_ref() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

struct HeapSlot(Arc<TimerEntry>);

impl PartialEq for HeapSlot {
    fn eq(&self, other: &Self) -> bool {
        self.0.deadline == other.0.deadline && self.0.seq == other.0.seq
    }
}

impl Eq for HeapSlot {}

impl PartialOrd for HeapSlot {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapSlot {
    // Reversed: BinaryHeap is a max-heap, we want the earliest deadline.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .0
            .deadline
            .cmp(&self.0.deadline)
            .then(other.0.seq.cmp(&self.0.seq))
    }
}

struct DriverState {
    heap: BinaryHeap<HeapSlot>,
    next_seq: u64,
    shutdown: bool,
}

/// Shared half of the timer driver.
pub(crate) struct TimerShared {
    state: Mutex<DriverState>,
    tick: Condvar,
}

impl TimerShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DriverState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            tick: Condvar::new(),
        })
    }

    /// Registers a deadline and returns the entry to poll against.
    pub(crate) fn register(&self, deadline: Instant) -> Arc<TimerEntry> {
        let mut state = self.state.lock();
        let entry = Arc::new(TimerEntry {
            deadline,
            seq: state.next_seq,
            fired: AtomicBool::new(false),
            waker: Mutex::new(None),
        });
        state.next_seq += 1;
        state.heap.push(HeapSlot(entry.clone()));
        drop(state);
        self.tick.notify_one();
        entry
    }

    pub(crate) fn shut_down(&self) {
        self.state.lock().shutdown = true;
        self.tick.notify_all();
    }
}

/// Body of the timer thread.
pub(crate) fn run_driver(shared: Arc<TimerShared>) {
    let mut due: Vec<Arc<TimerEntry>> = Vec::new();
    loop {
        {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                let now = Instant::now();
                while state
                    .heap
                    .peek()
                    .is_some_and(|slot| slot.0.deadline <= now)
                {
                    let slot = state
                        .heap
                        .pop()
                        .unwrap_or_else(|| unreachable!("peeked above"));
                    due.push(slot.0);
                }
                if !due.is_empty() {
                    break;
                }
                match state.heap.peek().map(|slot| slot.0.deadline) {
                    Some(next) => {
                        let _ = shared.tick.wait_until(&mut state, next);
                    }
                    None => shared.tick.wait(&mut state),
                }
            }
        }
        // Fire outside the heap lock; wakers may re-enter the runtime.
        for entry in due.drain(..) {
            entry.fire();
        }
    }
}
