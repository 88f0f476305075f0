//! Cold recipe wrapper.

use super::Stream;
use crate::error::{Error, Result};
use crate::stream::Retry;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Wraps a producer recipe so the stream it describes is built lazily.
///
/// Nothing runs until the first poll, and the recipe can be re-invoked
/// from scratch, which is what [`Cold::retry`] relies on. Collecting two
/// streams built from the same factory yields identical, fully independent
/// runs.
pub fn cold<F, S>(factory: F) -> Cold<F, S>
where
    F: FnMut() -> S,
    S: Stream,
{
    Cold {
        factory,
        inner: None,
    }
}

/// Stream for the [`cold`] function.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Cold<F, S> {
    factory: F,
    inner: Option<S>,
}

impl<F, S, T> Cold<F, S>
where
    F: FnMut() -> S,
    S: Stream<Item = Result<T>>,
{
    /// Restarts the recipe from scratch on a failure matching `predicate`,
    /// up to `max_attempts` total runs. Cancellation never triggers a
    /// restart. Items emitted before a failure are not recalled.
    pub fn retry<P>(self, max_attempts: usize, predicate: P) -> Retry<F, S, P>
    where
        P: FnMut(&Error) -> bool,
    {
        Retry::new(self.factory, max_attempts, predicate)
    }
}

impl<F, S> Stream for Cold<F, S>
where
    F: FnMut() -> S + Unpin,
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let inner = this.inner.get_or_insert_with(&mut this.factory);
        Pin::new(inner).poll_next(cx)
    }
}
