//! Per-task capability context.
//!
//! Every spawned body receives a [`Cx`]: the task's identity, its
//! cancellation token, and access to timers, nested scopes, and pool
//! hand-off. The context is explicit rather than thread-local so a body
//! can hand it to helpers and streams without hidden state.

use crate::cancel::{CancelToken, Cancelled};
use crate::error::{Error, Result};
use crate::runtime::task::{TaskCore, TaskId};
use crate::scope::{FailurePolicy, Scope, ScopeShared, TaskHandle, spawn_impl};
use crate::time::{Sleep, Timeout, Timer};
use pin_project::{pin_project, pinned_drop};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

/// Handle to the currently running task.
#[derive(Clone)]
pub struct Cx {
    id: TaskId,
    token: CancelToken,
    core: Weak<TaskCore>,
    scope: Arc<ScopeShared>,
}

impl Cx {
    pub(crate) fn new(
        id: TaskId,
        token: CancelToken,
        core: Weak<TaskCore>,
        scope: Arc<ScopeShared>,
    ) -> Self {
        Self {
            id,
            token,
            core,
            scope,
        }
    }

    /// Identity of the running task.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether cancellation has been requested for this task.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Errors with [`Error::Cancelled`] once cancellation is requested.
    ///
    /// Long CPU-bound loops should call this between chunks of work; the
    /// task wrapper only observes cancellation at suspension points.
    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        self.token.cancelled()
    }

    /// The runtime's timer, usable by timed operators such as `debounce`.
    #[must_use]
    pub fn timer(&self) -> Timer {
        Timer::new(self.scope.runtime.timer.clone())
    }

    /// Suspends the task for `duration`.
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        self.timer().sleep(duration)
    }

    /// Races `future` against a `window`-long timer; the loser is dropped.
    ///
    /// Resolves to [`Error::Timeout`] when the timer wins.
    #[must_use]
    pub fn timeout<F, T>(&self, window: Duration, future: F) -> Timeout<F>
    where
        F: Future<Output = Result<T>>,
    {
        Timeout::new(self.timer(), window, future)
    }

    /// Spawns a sibling task into the owning scope on the default lane.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        spawn_impl(&self.scope, crate::runtime::COMPUTE, f)
    }

    /// Opens a nested scope whose root is a child of this task, so
    /// cancelling this task cancels everything in the nested scope.
    #[must_use]
    pub fn scope(&self, policy: FailurePolicy) -> Scope {
        Scope::new_nested(self.scope.runtime.clone(), self.id, policy)
    }

    /// Runs `future` on the named lane, then resumes here.
    ///
    /// This is a context switch, not a new task: the running task keeps its
    /// identity, cancellation linkage, and position in the tree; only its
    /// pool assignment changes for the duration of the nested block.
    /// Statement order around the switch is preserved for this task only.
    ///
    /// # Panics
    ///
    /// Panics if `lane` was not registered with the runtime builder.
    #[must_use]
    pub fn on_pool<F>(&self, lane: &str, future: F) -> OnPool<F>
    where
        F: Future,
    {
        let target = self
            .scope
            .runtime
            .pool_index(lane)
            .unwrap_or_else(|| panic!("unknown pool lane `{lane}`"));
        OnPool {
            core: self.core.clone(),
            target,
            original: None,
            inner: future,
            output: None,
            phase: Phase::Enter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Enter,
    Run,
    Resume,
}

/// Future returned by [`Cx::on_pool`].
///
/// `original` holds the lane to hand the task back to; it is cleared once
/// the hand-back happens, and the drop impl performs it instead when the
/// section is abandoned mid-flight (timeout race, cancellation), so the
/// task never stays migrated past the section's lifetime.
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct OnPool<F: Future> {
    core: Weak<TaskCore>,
    target: usize,
    original: Option<usize>,
    #[pin]
    inner: F,
    output: Option<F::Output>,
    phase: Phase,
}

impl<F: Future> Future for OnPool<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match *this.phase {
                Phase::Enter => {
                    *this.phase = Phase::Run;
                    let Some(core) = this.core.upgrade() else {
                        // Detached from its core; run the block in place.
                        continue;
                    };
                    let original = core.pool_index();
                    if original == *this.target {
                        continue;
                    }
                    *this.original = Some(original);
                    core.assign_pool(*this.target);
                    // Hand off: the wake re-enqueues onto the target pool.
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
                Phase::Run => {
                    let output = match this.inner.as_mut().poll(cx) {
                        Poll::Ready(output) => output,
                        Poll::Pending => return Poll::Pending,
                    };
                    let Some(original) = this.original.take() else {
                        return Poll::Ready(output);
                    };
                    let Some(core) = this.core.upgrade() else {
                        return Poll::Ready(output);
                    };
                    core.assign_pool(original);
                    *this.output = Some(output);
                    *this.phase = Phase::Resume;
                    // Hand back to the original pool before resuming.
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
                Phase::Resume => {
                    let output = this
                        .output
                        .take()
                        .expect("`OnPool` polled after completion");
                    return Poll::Ready(output);
                }
            }
        }
    }
}

#[pinned_drop]
impl<F: Future> PinnedDrop for OnPool<F> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if let Some(original) = this.original.take()
            && let Some(core) = this.core.upgrade()
        {
            core.assign_pool(original);
        }
    }
}
