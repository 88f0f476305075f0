//! Structured scopes and task handles.
//!
//! A [`Scope`] owns a subtree of tasks: a synthetic root record plus every
//! task spawned through the scope. Cancelling the scope cancels all
//! descendants; what happens when a child fails is governed by the scope's
//! [`FailurePolicy`]. Dropping a scope cancels it, so no task can outlive
//! the scope that spawned it.

use crate::cancel::CancelToken;
use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::runtime::COMPUTE;
use crate::runtime::RuntimeShared;
use crate::runtime::task::{TaskCore, TaskId, TaskState, task_waker};
use futures::channel::oneshot;
use parking_lot::Mutex;
use pin_project::pin_project;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// What an uncaught child failure does to the rest of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First failure cancels the scope root, cascading to every sibling.
    FailFast,
    /// Failures are reported to the scope's handler; siblings run on.
    Isolate,
}

type FailureHandler = Box<dyn Fn(TaskId, Error) + Send + Sync + 'static>;

pub(crate) struct ScopeShared {
    pub(crate) runtime: Arc<RuntimeShared>,
    pub(crate) root: TaskId,
    policy: FailurePolicy,
    handler: Mutex<Option<FailureHandler>>,
}

impl ScopeShared {
    /// Applies the failure policy after a child has been finalized.
    fn child_finished(&self, id: TaskId, failure: Option<Error>) {
        let Some(error) = failure else { return };
        match self.policy {
            FailurePolicy::FailFast => {
                tracing::debug!(task = %id, %error, "child failed, cancelling scope");
                self.runtime.table.cancel(self.root);
            }
            FailurePolicy::Isolate => {
                let handler = self.handler.lock();
                match handler.as_ref() {
                    Some(handler) => handler(id, error),
                    None => {
                        tracing::error!(task = %id, %error, "isolated task failure (no handler registered)");
                    }
                }
            }
        }
    }
}

/// Owner of a task subtree. See the module docs.
pub struct Scope {
    shared: Arc<ScopeShared>,
}

impl Scope {
    pub(crate) fn new_root(runtime: Arc<RuntimeShared>, policy: FailurePolicy) -> Self {
        let root = runtime.table.insert_root(None);
        Self::with_root(runtime, root, policy)
    }

    pub(crate) fn new_nested(
        runtime: Arc<RuntimeShared>,
        parent: TaskId,
        policy: FailurePolicy,
    ) -> Self {
        let root = runtime.table.insert_root(Some(parent));
        Self::with_root(runtime, root, policy)
    }

    fn with_root(runtime: Arc<RuntimeShared>, root: TaskId, policy: FailurePolicy) -> Self {
        tracing::trace!(scope = %root, ?policy, "scope created");
        Self {
            shared: Arc::new(ScopeShared {
                runtime,
                root,
                policy,
                handler: Mutex::new(None),
            }),
        }
    }

    /// Registers the handler that receives isolated child failures.
    pub fn on_failure(&self, handler: impl Fn(TaskId, Error) + Send + Sync + 'static) {
        *self.shared.handler.lock() = Some(Box::new(handler));
    }

    /// Spawns `f`'s future on the default [`COMPUTE`] lane.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_on(COMPUTE, f)
    }

    /// Spawns `f`'s future as a child of the scope root on the named lane.
    ///
    /// # Panics
    ///
    /// Panics if `lane` was not registered with the runtime builder.
    pub fn spawn_on<F, Fut, T>(&self, lane: &str, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        spawn_impl(&self.shared, lane, f)
    }

    /// Requests cancellation of the whole subtree. Idempotent.
    pub fn cancel(&self) {
        self.shared.runtime.table.cancel(self.shared.root);
    }

    /// Whether the scope has been cancelled (or fully released).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .runtime
            .table
            .state_of(self.shared.root)
            .is_none_or(TaskState::is_terminal)
    }

    /// Resolves once every task owned by the scope is terminal.
    #[must_use]
    pub fn join(&self) -> JoinChildren<'_> {
        JoinChildren { scope: self }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.cancel();
        self.shared.runtime.table.release_root(self.shared.root);
    }
}

/// Future returned by [`Scope::join`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct JoinChildren<'a> {
    scope: &'a Scope,
}

impl Future for JoinChildren<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let shared = &self.scope.shared;
        if shared
            .runtime
            .table
            .poll_children_done(shared.root, cx.waker())
        {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

pub(crate) fn spawn_impl<F, Fut, T>(scope: &Arc<ScopeShared>, lane: &str, f: F) -> TaskHandle<T>
where
    F: FnOnce(Cx) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let runtime = scope.runtime.clone();
    let pool = runtime
        .pool_index(lane)
        .unwrap_or_else(|| panic!("unknown pool lane `{lane}`"));
    let (tx, rx) = oneshot::channel();
    let token = CancelToken::new();

    // The terminal check and the insertion happen under one table lock, so
    // a concurrent cancel cascade either rejects the spawn outright or sees
    // the new child and flips its token. A cancelled (or already released)
    // scope accepts no new work.
    let inserted = runtime.table.insert_child_with(scope.root, |id| {
        Arc::new(TaskCore::new(id, pool, token.clone(), runtime.clone()))
    });
    let Some(core) = inserted else {
        let _ = tx.send(Err(Error::Cancelled));
        return TaskHandle {
            rx,
            done: false,
            id: None,
            core: None,
            shared: runtime,
        };
    };
    let id = core.id;

    let cx = Cx::new(id, token.clone(), Arc::downgrade(&core), scope.clone());
    let scope_shared = scope.clone();
    let wrapped = async move {
        let outcome = TaskBody {
            token,
            inner: f(cx),
        }
        .await;
        let (state, failure) = match &outcome {
            Ok(_) => (TaskState::Completed, None),
            Err(error) if error.is_cancelled() => (TaskState::Cancelled, None),
            Err(error) => (TaskState::Failed, Some(error.clone())),
        };
        scope_shared.runtime.table.finalize(id, state);
        scope_shared.child_finished(id, failure);
        let _ = tx.send(outcome);
    };
    *core.future.lock() = Some(Box::pin(wrapped));
    tracing::trace!(task = %id, lane = %runtime.pool_name(pool), "spawn");
    task_waker(&core).wake();

    TaskHandle {
        rx,
        done: false,
        id: Some(id),
        core: Some(core),
        shared: runtime,
    }
}

/// Wraps a task body: aborts at the first poll after cancellation is
/// requested and converts panics into [`Error::Upstream`].
#[pin_project]
struct TaskBody<Fut> {
    token: CancelToken,
    #[pin]
    inner: Fut,
}

impl<Fut, T> Future for TaskBody<Fut>
where
    Fut: Future<Output = Result<T>>,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.token.is_cancelled() {
            return Poll::Ready(Err(Error::Cancelled));
        }
        let mut inner = this.inner;
        match catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx))) {
            Ok(poll) => poll,
            Err(payload) => Poll::Ready(Err(Error::upstream(panic_message(payload.as_ref())))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

/// A handle to a spawned task.
///
/// The handle is a future resolving to the task's result; completion is
/// wired through a oneshot channel, so the handle can outlive the task.
/// Dropping the handle detaches it without cancelling the task (the owning
/// scope still bounds the task's lifetime).
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
    done: bool,
    id: Option<TaskId>,
    core: Option<Arc<TaskCore>>,
    shared: Arc<RuntimeShared>,
}

impl<T> TaskHandle<T> {
    /// The identity of the spawned task, if the spawn was accepted.
    #[must_use]
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Current lifecycle state. Terminal states are stable.
    #[must_use]
    pub fn state(&self) -> TaskState {
        match &self.core {
            Some(core) => core.state(),
            None => TaskState::Cancelled,
        }
    }

    /// Whether cancellation has been requested for this task.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &self.core {
            Some(core) => core.token.is_cancelled(),
            None => true,
        }
    }

    /// Cancels this task and its descendants only. Idempotent.
    pub fn cancel(&self) {
        if let Some(id) = self.id {
            self.shared.table.cancel(id);
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.done {
            return Poll::Pending;
        }
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                this.done = true;
                Poll::Ready(result)
            }
            Poll::Ready(Err(_dropped)) => {
                this.done = true;
                Poll::Ready(Err(Error::upstream(
                    "task terminated without delivering a result",
                )))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
