//! The engine's executor: named worker pools, the task arena, and the
//! timer driver.
//!
//! A [`Runtime`] is built from a [`Builder`] that registers logical lanes
//! (worker pools). Work enters through a [`Scope`](crate::scope::Scope) and
//! is driven either by the pool workers or, for the outermost future, by
//! [`Runtime::block_on`] parking the calling thread the way a hand-rolled
//! single-thread executor does.

pub(crate) mod pool;
pub(crate) mod task;
pub(crate) mod timer;
pub(crate) mod waker;

pub use pool::PoolConfig;
pub use task::{TaskId, TaskState};

use crate::cx::Cx;
use crate::error::Result;
use crate::scope::{FailurePolicy, Scope};
use pool::Pool;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use task::{TaskCore, TaskTable};
use timer::TimerShared;
use waker::{ThreadNotify, thread_waker};

/// Default lane driving UI-adjacent, latency-sensitive work.
pub const INTERACTIVE: &str = "interactive";
/// Default lane for CPU-bound work.
pub const COMPUTE: &str = "compute";
/// Default lane for blocking I/O.
pub const BLOCKING_IO: &str = "blocking-io";

/// Shared internals handed to every task core.
pub(crate) struct RuntimeShared {
    pools: Vec<Arc<Pool>>,
    pub(crate) table: TaskTable,
    pub(crate) timer: Arc<TimerShared>,
}

impl RuntimeShared {
    pub(crate) fn pool_index(&self, name: &str) -> Option<usize> {
        self.pools.iter().position(|pool| pool.name == name)
    }

    pub(crate) fn pool_name(&self, index: usize) -> &str {
        &self.pools[index].name
    }

    pub(crate) fn schedule(&self, core: Arc<TaskCore>) {
        self.pools[core.pool_index()].push(core);
    }
}

/// Configures and builds a [`Runtime`].
///
/// The three default lanes ([`INTERACTIVE`], [`COMPUTE`], [`BLOCKING_IO`])
/// are always present; [`Builder::pool`] adjusts their worker counts or
/// registers additional lanes.
#[derive(Debug, Clone)]
pub struct Builder {
    pools: Vec<PoolConfig>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            pools: vec![
                PoolConfig::new(INTERACTIVE, 1),
                PoolConfig::new(COMPUTE, 4),
                PoolConfig::new(BLOCKING_IO, 8),
            ],
        }
    }
}

impl Builder {
    /// Starts from the default lane set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count for `name`, adding the lane if it is new.
    #[must_use]
    pub fn pool(mut self, name: impl Into<String>, workers: usize) -> Self {
        let config = PoolConfig::new(name, workers);
        match self.pools.iter_mut().find(|p| p.name == config.name) {
            Some(existing) => existing.workers = config.workers,
            None => self.pools.push(config),
        }
        self
    }

    /// Spawns the worker and timer threads and returns the running engine.
    #[must_use]
    pub fn build(self) -> Runtime {
        let pools: Vec<Arc<Pool>> = self
            .pools
            .iter()
            .map(|config| Arc::new(Pool::new(config.name.clone())))
            .collect();
        let shared = Arc::new(RuntimeShared {
            pools: pools.clone(),
            table: TaskTable::default(),
            timer: TimerShared::new(),
        });

        let mut workers = Vec::new();
        for (pool, config) in pools.iter().zip(&self.pools) {
            for index in 0..config.workers {
                let pool = pool.clone();
                let name = format!("rill-{}-{index}", config.name);
                let handle = thread::Builder::new()
                    .name(name)
                    .spawn(move || pool::run_worker(pool))
                    .expect("failed to spawn worker thread");
                workers.push(handle);
            }
        }
        let timer_shared = shared.timer.clone();
        let timer_thread = thread::Builder::new()
            .name("rill-timer".into())
            .spawn(move || timer::run_driver(timer_shared))
            .expect("failed to spawn timer thread");

        tracing::debug!(pools = ?self.pools.iter().map(|p| (&p.name, p.workers)).collect::<Vec<_>>(), "runtime started");
        Runtime {
            shared,
            workers,
            timer_thread: Some(timer_thread),
        }
    }
}

/// A running engine. Dropping it shuts the worker and timer threads down.
pub struct Runtime {
    shared: Arc<RuntimeShared>,
    workers: Vec<JoinHandle<()>>,
    timer_thread: Option<JoinHandle<()>>,
}

impl Runtime {
    /// A runtime with the default lane set.
    #[must_use]
    pub fn new() -> Self {
        Builder::new().build()
    }

    /// Entry point for configuration.
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// A cloneable handle for creating scopes.
    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle {
            shared: self.shared.clone(),
        }
    }

    /// Runs `f`'s future as the root task on the [`INTERACTIVE`] lane,
    /// parking the calling thread until it resolves.
    ///
    /// The root runs inside a fail-fast scope; anything it leaves running
    /// is cancelled and drained before this returns.
    pub fn block_on<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Cx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let scope = self.handle().scope(FailurePolicy::FailFast);
        let handle = scope.spawn_on(INTERACTIVE, f);
        let output = block_current_thread(handle);
        scope.cancel();
        block_current_thread(scope.join());
        output
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shared.timer.shut_down();
        for pool in &self.shared.pools {
            pool.shut_down();
        }
        if let Some(timer) = self.timer_thread.take() {
            let _ = timer.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Cloneable access to a runtime.
#[derive(Clone)]
pub struct Handle {
    pub(crate) shared: Arc<RuntimeShared>,
}

impl Handle {
    /// Creates a top-level scope with the given failure policy.
    #[must_use]
    pub fn scope(&self, policy: FailurePolicy) -> Scope {
        Scope::new_root(self.shared.clone(), policy)
    }
}

/// Drives a future on the calling thread, parking between wakeups.
fn block_current_thread<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let notify = Arc::new(ThreadNotify::current());
    let waker = thread_waker(&notify);
    let mut cx = Context::from_waker(&waker);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => {
                if !notify.take_wakeup() {
                    thread::park();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lanes_are_registered() {
        let rt = Runtime::new();
        let shared = &rt.shared;
        assert!(shared.pool_index(INTERACTIVE).is_some());
        assert!(shared.pool_index(COMPUTE).is_some());
        assert!(shared.pool_index(BLOCKING_IO).is_some());
        assert!(shared.pool_index("nonexistent").is_none());
    }

    #[test]
    fn builder_overrides_and_extends_lanes() {
        let rt = Runtime::builder()
            .pool(COMPUTE, 1)
            .pool("extra", 1)
            .build();
        let shared = &rt.shared;
        let extra = shared.pool_index("extra").unwrap();
        assert_eq!(shared.pool_name(extra), "extra");
    }

    #[test]
    fn block_on_returns_the_root_value() {
        let rt = Runtime::new();
        assert_eq!(rt.block_on(|_cx| async move { Ok(5) }), Ok(5));
    }

    #[test]
    fn runtime_shuts_down_cleanly_when_dropped() {
        let rt = Runtime::builder().pool(COMPUTE, 2).build();
        rt.block_on(|_cx| async move { Ok(()) }).unwrap();
        drop(rt);
    }
}
