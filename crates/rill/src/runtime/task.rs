//! Task records, the task arena, and the task tree.
//!
//! Tasks live in an arena indexed by [`TaskId`]; parent/child relationships
//! are stored as id links rather than live references, so the tree carries
//! no cyclic ownership. Cancellation cascades top-down through the links and
//! terminal states are sticky.

use crate::cancel::CancelToken;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::task::{Wake, Waker};

use super::RuntimeShared;

/// Identity of a task, unique within its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task.
///
/// `Completed`, `Cancelled` and `Failed` are terminal and sticky: the table
/// refuses any transition out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Running or suspended, able to make progress.
    Active = 0,
    /// The body finished; the result is being delivered.
    Completing = 1,
    /// Finished with a value.
    Completed = 2,
    /// Cancellation requested, not yet observed.
    Cancelling = 3,
    /// Observed cancellation and stopped.
    Cancelled = 4,
    /// The body raised an uncaught failure.
    Failed = 5,
}

impl TaskState {
    /// Whether the state can never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Active,
            1 => Self::Completing,
            2 => Self::Completed,
            3 => Self::Cancelling,
            4 => Self::Cancelled,
            _ => Self::Failed,
        }
    }
}

pub(crate) type BoxedTaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The executable half of a task: its future, pool assignment, and waker
/// state. Shared between the queue, the table entry, and the task handle.
pub(crate) struct TaskCore {
    pub(crate) id: TaskId,
    /// Index of the pool the task is currently assigned to. A context
    /// switch rewrites this; the next wakeup lands on the new pool.
    pool: AtomicUsize,
    /// Dedup flag: set while the task sits in a run queue.
    scheduled: AtomicBool,
    /// Mirror of the table state, queryable after the entry is released.
    state: AtomicU8,
    pub(crate) future: Mutex<Option<BoxedTaskFuture>>,
    pub(crate) token: CancelToken,
    pub(crate) shared: Arc<RuntimeShared>,
}

impl TaskCore {
    pub(crate) fn new(
        id: TaskId,
        pool: usize,
        token: CancelToken,
        shared: Arc<RuntimeShared>,
    ) -> Self {
        Self {
            id,
            pool: AtomicUsize::new(pool),
            scheduled: AtomicBool::new(false),
            state: AtomicU8::new(TaskState::Active as u8),
            future: Mutex::new(None),
            token,
            shared,
        }
    }

    pub(crate) fn pool_index(&self) -> usize {
        self.pool.load(Ordering::Acquire)
    }

    pub(crate) fn assign_pool(&self, pool: usize) {
        self.pool.store(pool, Ordering::Release);
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn record_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Clears the queue-dedup flag; called by a worker right before polling.
    pub(crate) fn clear_scheduled(&self) {
        self.scheduled.store(false, Ordering::Release);
    }
}

impl fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("pool", &self.pool.load(Ordering::Relaxed))
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Wake for TaskCore {
    fn wake(self: Arc<Self>) {
        // First wake wins; duplicates while queued are dropped.
        if !self.scheduled.swap(true, Ordering::AcqRel) {
            let shared = self.shared.clone();
            shared.schedule(self);
        }
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().wake();
    }
}

pub(crate) fn task_waker(core: &Arc<TaskCore>) -> Waker {
    Waker::from(core.clone())
}

struct TaskEntry {
    state: TaskState,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    core: Option<Arc<TaskCore>>,
    /// Wakers waiting for this entry to have no live children (scope join).
    join_waiters: Vec<Waker>,
    /// The owning scope let go of this root; drop it when the last child
    /// finalizes.
    released: bool,
}

impl TaskEntry {
    fn new(parent: Option<TaskId>) -> Self {
        Self {
            state: TaskState::Active,
            parent,
            children: Vec::new(),
            core: None,
            join_waiters: Vec::new(),
            released: false,
        }
    }
}

#[derive(Default)]
struct TableInner {
    next_id: u64,
    entries: HashMap<TaskId, TaskEntry>,
}

/// The task arena.
#[derive(Default)]
pub(crate) struct TaskTable {
    inner: Mutex<TableInner>,
}

impl TaskTable {
    /// Inserts a record with no executable core (a scope root).
    pub(crate) fn insert_root(&self, parent: Option<TaskId>) -> TaskId {
        let mut inner = self.inner.lock();
        let id = TaskId(inner.next_id);
        inner.next_id += 1;
        inner.entries.insert(id, TaskEntry::new(parent));
        if let Some(parent) = parent
            && let Some(entry) = inner.entries.get_mut(&parent)
        {
            entry.children.push(id);
        }
        id
    }

    /// Allocates an id for an executable task under `parent`, builds its
    /// core via `make_core`, and links the record into the tree, all under
    /// one table lock. Returns `None` when the parent is missing or already
    /// terminal, so no child can slip in behind a cancel cascade.
    pub(crate) fn insert_child_with(
        &self,
        parent: TaskId,
        make_core: impl FnOnce(TaskId) -> Arc<TaskCore>,
    ) -> Option<Arc<TaskCore>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(&parent) {
            Some(entry) if !entry.state.is_terminal() => {}
            _ => return None,
        }
        let id = TaskId(inner.next_id);
        inner.next_id += 1;
        let core = make_core(id);
        let mut entry = TaskEntry::new(Some(parent));
        entry.core = Some(core.clone());
        inner.entries.insert(id, entry);
        if let Some(parent_entry) = inner.entries.get_mut(&parent) {
            parent_entry.children.push(id);
        }
        Some(core)
    }

    pub(crate) fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.inner.lock().entries.get(&id).map(|e| e.state)
    }

    /// Requests cancellation of `id` and every descendant.
    ///
    /// Tokens are flipped and tasks woken immediately; each task turns
    /// terminal at its next suspension point. Records without a core
    /// (scope roots) go terminal right away. Idempotent.
    pub(crate) fn cancel(&self, id: TaskId) {
        let mut to_wake = Vec::new();
        let mut joins = Vec::new();
        {
            let mut inner = self.inner.lock();
            let mut pending = vec![id];
            while let Some(current) = pending.pop() {
                let Some(entry) = inner.entries.get_mut(&current) else {
                    continue;
                };
                pending.extend(entry.children.iter().copied());
                if entry.state.is_terminal() {
                    continue;
                }
                match entry.core.clone() {
                    Some(core) => {
                        entry.state = TaskState::Cancelling;
                        core.record_state(TaskState::Cancelling);
                        to_wake.push(core);
                    }
                    None => {
                        entry.state = TaskState::Cancelled;
                        joins.append(&mut entry.join_waiters);
                    }
                }
            }
        }
        for core in to_wake {
            tracing::debug!(task = %core.id, "cancel requested");
            core.token.cancel();
            task_waker(&core).wake();
        }
        for waker in joins {
            waker.wake();
        }
    }

    /// Records the terminal state of `id`, detaches it from its parent, and
    /// releases the entry. Terminal states are sticky: finalizing an
    /// already-terminal entry is a no-op.
    pub(crate) fn finalize(&self, id: TaskId, state: TaskState) {
        debug_assert!(state.is_terminal());
        let mut wakers = Vec::new();
        {
            let mut inner = self.inner.lock();
            match inner.entries.get(&id) {
                None => return,
                Some(entry) if entry.state.is_terminal() => return,
                Some(_) => {}
            }
            let mut entry = inner
                .entries
                .remove(&id)
                .unwrap_or_else(|| unreachable!("entry checked above"));
            entry.state = state;
            if let Some(core) = &entry.core {
                core.record_state(state);
            }
            wakers.append(&mut entry.join_waiters);
            // Detach from the parent. An already-released parent whose last
            // child just left is removed as well, cascading upward.
            let mut child = id;
            let mut parent_link = entry.parent;
            while let Some(parent) = parent_link {
                let Some(parent_entry) = inner.entries.get_mut(&parent) else {
                    break;
                };
                parent_entry.children.retain(|c| *c != child);
                if !parent_entry.children.is_empty() {
                    break;
                }
                wakers.append(&mut parent_entry.join_waiters);
                if !parent_entry.released {
                    break;
                }
                let removed = inner
                    .entries
                    .remove(&parent)
                    .unwrap_or_else(|| unreachable!("entry held above"));
                child = parent;
                parent_link = removed.parent;
            }
        }
        tracing::debug!(task = %id, ?state, "task finalized");
        for waker in wakers {
            waker.wake();
        }
    }

    /// Whether `id` still has live children. Missing entries count as done.
    /// Registers `waker` to fire when the child count reaches zero.
    pub(crate) fn poll_children_done(&self, id: TaskId, waker: &Waker) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&id) {
            None => true,
            Some(entry) if entry.children.is_empty() => true,
            Some(entry) => {
                if !entry.join_waiters.iter().any(|w| w.will_wake(waker)) {
                    entry.join_waiters.push(waker.clone());
                }
                false
            }
        }
    }

    /// Drops the record for a scope root. If children are still winding
    /// down the record is marked released and removed when the last child
    /// finalizes.
    pub(crate) fn release_root(&self, id: TaskId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return;
        };
        if !entry.children.is_empty() {
            entry.released = true;
            return;
        }
        let removed = inner.entries.remove(&id);
        if let Some(entry) = removed
            && let Some(parent) = entry.parent
            && let Some(parent_entry) = inner.entries.get_mut(&parent)
        {
            parent_entry.children.retain(|child| *child != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::pool::Pool;
    use crate::runtime::timer::TimerShared;

    fn shared() -> Arc<RuntimeShared> {
        Arc::new(RuntimeShared {
            pools: vec![Arc::new(Pool::new("test".into()))],
            table: TaskTable::default(),
            timer: TimerShared::new(),
        })
    }

    fn idle_core(shared: &Arc<RuntimeShared>, id: TaskId) -> Arc<TaskCore> {
        Arc::new(TaskCore::new(id, 0, CancelToken::new(), shared.clone()))
    }

    #[test]
    fn terminal_parent_rejects_new_children() {
        let shared = shared();
        let root = shared.table.insert_root(None);
        shared.table.cancel(root);
        let inserted = shared
            .table
            .insert_child_with(root, |id| idle_core(&shared, id));
        assert!(inserted.is_none());
    }

    #[test]
    fn cancel_cascade_reaches_a_freshly_inserted_child() {
        let shared = shared();
        let root = shared.table.insert_root(None);
        let core = shared
            .table
            .insert_child_with(root, |id| idle_core(&shared, id))
            .unwrap_or_else(|| unreachable!("root is live"));
        shared.table.cancel(root);
        assert!(core.token.is_cancelled());
        assert_eq!(core.state(), TaskState::Cancelling);
        assert_eq!(shared.table.state_of(core.id), Some(TaskState::Cancelling));
    }
}
