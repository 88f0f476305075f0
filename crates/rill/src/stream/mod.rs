//! Cold streams and the operator pipeline.
//!
//! This module provides the [`Stream`] trait and the combinators that make
//! up the engine's operator pipeline.
//!
//! # Cold by construction
//!
//! A stream value is a recipe that does nothing until polled, and it is
//! consumed by collection. Re-collecting a definition means rebuilding it;
//! the [`cold`] constructor captures that as a factory so restart-based
//! operators (`retry`) and repeated collections re-execute the recipe from
//! scratch, fully independently.
//!
//! # Combinators
//!
//! ## Transformation
//! - [`Map`]: transforms each item with a closure
//! - [`Filter`]: yields only items matching a predicate
//! - [`DistinctUntilChanged`]: suppresses adjacent duplicates
//!
//! ## Selection and combination
//! - [`Take`]: limits the stream to n items, then cancels upstream
//! - [`Zip`]: pairs items from two streams by arrival index
//! - [`FlatMapConcat`]: strict sequential flattening
//! - [`FlatMapLatest`]: keeps only the newest inner stream
//!
//! ## Timing
//! - [`Debounce`]: emits an item only after a quiet window
//!
//! ## Recovery (over `Stream<Item = Result<T>>`)
//! - [`Retry`]: restarts a cold recipe on matching failures
//! - [`Catch`]: splices in a replacement stream on failure
//!
//! ## Terminal operations
//! - [`Collect`] / [`TryCollect`]: drain into an ordered `Vec`
//! - [`Fold`] / [`Reduce`] / [`TryFold`]: accumulate to a single value
//! - [`ForEach`]: run a closure per item
//! - [`Next`]: pull one item

mod catch;
mod cold;
mod collect;
mod debounce;
mod distinct;
mod filter;
mod flat_map;
mod fold;
mod for_each;
mod iter;
mod map;
mod next;
mod retry;
mod take;
mod zip;

pub use catch::Catch;
pub use cold::{Cold, cold};
pub use collect::{Collect, TryCollect};
pub use debounce::Debounce;
pub use distinct::DistinctUntilChanged;
pub use filter::Filter;
pub use flat_map::{FlatMapConcat, FlatMapLatest};
pub use fold::{Fold, Reduce, TryFold};
pub use for_each::ForEach;
pub use iter::{Empty, Iter, Once, empty, iter, once};
pub use map::Map;
pub use next::Next;
pub use retry::Retry;
pub use take::Take;
pub use zip::Zip;

use crate::error::{Error, Result};
use crate::time::Timer;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// An asynchronous sequence of values.
///
/// The pull-based analogue of [`Iterator`]: `poll_next` either yields the
/// next item, signals completion with `None`, or parks the consumer until
/// the producer has more.
pub trait Stream {
    /// The type of value yielded.
    type Item;

    /// Attempts to pull the next value out of this stream.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>>;

    /// Bounds on the number of remaining items, `(lower, upper)`.
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

impl<S: Stream + Unpin + ?Sized> Stream for Box<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (**self).size_hint()
    }
}

impl<S: Stream + Unpin + ?Sized> Stream for &mut S {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (**self).size_hint()
    }
}

/// An owned, type-erased stream.
pub type BoxStream<T> = Box<dyn Stream<Item = T> + Send + Unpin>;

/// Combinator methods for [`Stream`].
pub trait StreamExt: Stream {
    /// Transforms every item with `f`, 1:1 and order-preserving.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> U,
        Self: Sized,
    {
        Map::new(self, f)
    }

    /// Keeps only the items for which `predicate` returns true.
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: FnMut(&Self::Item) -> bool,
        Self: Sized,
    {
        Filter::new(self, predicate)
    }

    /// Yields at most `n` items, then completes and drops the upstream.
    fn take(self, n: usize) -> Take<Self>
    where
        Self: Sized,
    {
        Take::new(self, n)
    }

    /// Pairs the i-th item of this stream with the i-th of `other` and
    /// combines them; completes when either side completes.
    fn zip<S2, F, U>(self, other: S2, combine: F) -> Zip<Self, S2, F>
    where
        S2: Stream,
        F: FnMut(Self::Item, S2::Item) -> U,
        Self: Sized,
    {
        Zip::new(self, other, combine)
    }

    /// Fully drains the stream produced for each item before consuming the
    /// next upstream item.
    fn flat_map_concat<S2, F>(self, f: F) -> FlatMapConcat<Self, S2, F>
    where
        S2: Stream,
        F: FnMut(Self::Item) -> S2,
        Self: Sized,
    {
        FlatMapConcat::new(self, f)
    }

    /// For each new upstream item, drops the in-flight inner stream and
    /// starts a fresh one; only the newest inner stream's items surface.
    fn flat_map_latest<S2, F>(self, f: F) -> FlatMapLatest<Self, S2, F>
    where
        S2: Stream,
        F: FnMut(Self::Item) -> S2,
        Self: Sized,
    {
        FlatMapLatest::new(self, f)
    }

    /// Emits an item only if `window` elapses without a newer one; a
    /// pending item is flushed when the upstream completes.
    fn debounce(self, window: Duration, timer: &Timer) -> Debounce<Self>
    where
        Self: Sized,
    {
        Debounce::new(self, window, timer.clone())
    }

    /// Suppresses items equal to the immediately preceding emission.
    fn distinct_until_changed(self) -> DistinctUntilChanged<Self>
    where
        Self::Item: Clone + PartialEq,
        Self: Sized,
    {
        DistinctUntilChanged::new(self)
    }

    /// Intercepts a failure item and splices in `handler`'s replacement
    /// stream. Cancellation is not intercepted.
    fn catch<T, R, F>(self, handler: F) -> Catch<Self, R, F>
    where
        Self: Stream<Item = Result<T>> + Sized,
        R: Stream<Item = Result<T>>,
        F: FnOnce(Error) -> R,
    {
        Catch::new(self, handler)
    }

    /// Pulls the next item.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }

    /// Drains the stream into an ordered `Vec`.
    fn collect(self) -> Collect<Self>
    where
        Self: Sized,
    {
        Collect::new(self)
    }

    /// Alias for [`collect`](StreamExt::collect).
    fn to_list(self) -> Collect<Self>
    where
        Self: Sized,
    {
        self.collect()
    }

    /// Drains a fallible stream, short-circuiting on the first error.
    fn try_collect<T>(self) -> TryCollect<Self, T>
    where
        Self: Stream<Item = Result<T>> + Sized,
    {
        TryCollect::new(self)
    }

    /// Accumulates every item onto `initial`. Never fails for emptiness.
    fn fold<B, F>(self, initial: B, f: F) -> Fold<Self, B, F>
    where
        F: FnMut(B, Self::Item) -> B,
        Self: Sized,
    {
        Fold::new(self, initial, f)
    }

    /// Accumulates a fallible stream, short-circuiting on the first error.
    fn try_fold<T, B, F>(self, initial: B, f: F) -> TryFold<Self, B, F>
    where
        Self: Stream<Item = Result<T>> + Sized,
        F: FnMut(B, T) -> B,
    {
        TryFold::new(self, initial, f)
    }

    /// Combines all items into one; fails with [`Error::EmptySequence`] if
    /// the stream yields nothing.
    fn reduce<F>(self, f: F) -> Reduce<Self, F>
    where
        F: FnMut(Self::Item, Self::Item) -> Self::Item,
        Self: Sized,
    {
        Reduce::new(self, f)
    }

    /// Runs `f` for every item, resolving when the stream completes.
    fn for_each<F>(self, f: F) -> ForEach<Self, F>
    where
        F: FnMut(Self::Item),
        Self: Sized,
    {
        ForEach::new(self, f)
    }

    /// Type-erases the stream.
    fn boxed(self) -> BoxStream<Self::Item>
    where
        Self: Sized + Send + Unpin + 'static,
    {
        Box::new(self)
    }
}

impl<S: Stream> StreamExt for S {}
