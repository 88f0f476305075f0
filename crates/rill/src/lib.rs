//! # Rill
//!
//! A structured-concurrency task engine with cold streams and hot relays.
//!
//! ## Overview
//!
//! Rill is a self-contained engine: it brings its own executor (named
//! worker pools, a task arena, a timer driver) rather than sitting on top
//! of another runtime. Work is organized as a tree of cancellable tasks
//! owned by scopes, data flows through cold pull-based streams with a
//! composable operator pipeline, and hot relays fan values out to any
//! number of attached consumers.
//!
//! ## Features
//!
//! - **Structured concurrency**: every task lives inside a scope;
//!   cancelling the scope cancels the whole subtree, always.
//! - **Named lanes**: tasks run on configurable worker pools and can hand
//!   a block of work to another lane without losing their identity.
//! - **Cold streams**: recipes that re-execute per collection, with
//!   `map` / `filter` / `take` / `zip` / `flat_map_*` / `debounce` /
//!   `distinct_until_changed` / `retry` / `catch` and terminal folds.
//! - **Hot relays**: a latest-value state relay and a replay-buffered
//!   broadcast relay, both safe to mutate from many attach points.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rill::Runtime;
//! use rill::stream::{StreamExt, iter};
//!
//! fn main() -> rill::Result<()> {
//!     let rt = Runtime::new();
//!     let squares = rt.block_on(|_cx| async move {
//!         Ok(iter([1, 2, 3]).map(|x| x * x).collect().await)
//!     })?;
//!     assert_eq!(squares, vec![1, 4, 9]);
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod cancel;
pub mod cx;
pub mod error;
pub mod relay;
pub mod runtime;
pub mod scope;
pub mod stream;
pub mod time;

pub use bridge::{Emitter, bridge_callback, bridge_once};
pub use cancel::CancelToken;
pub use cx::Cx;
pub use error::{Error, Result};
pub use relay::{BroadcastRelay, StateRelay};
pub use runtime::{
    BLOCKING_IO, Builder, COMPUTE, Handle, INTERACTIVE, PoolConfig, Runtime, TaskId, TaskState,
};
pub use scope::{FailurePolicy, Scope, TaskHandle};
pub use time::{Sleep, Timer};
