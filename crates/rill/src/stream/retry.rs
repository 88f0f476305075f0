//! Retry combinator over cold recipes.

use super::Stream;
use crate::error::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the [`retry`](super::Cold::retry) method.
///
/// Holds the producer factory rather than a running stream: a failure that
/// satisfies the predicate discards the in-flight run and re-invokes the
/// recipe from scratch, not from a checkpoint. A failure that exhausts the
/// attempt budget (or fails the predicate, or is a cancellation) is yielded
/// downstream and ends the stream.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Retry<F, S, P> {
    factory: F,
    max_attempts: usize,
    predicate: P,
    attempt: usize,
    inner: Option<S>,
    done: bool,
}

impl<F, S, P> Retry<F, S, P> {
    pub(crate) fn new(factory: F, max_attempts: usize, predicate: P) -> Self {
        Self {
            factory,
            max_attempts: max_attempts.max(1),
            predicate,
            attempt: 0,
            inner: None,
            done: false,
        }
    }
}

impl<F, S, P, T> Stream for Retry<F, S, P>
where
    F: FnMut() -> S + Unpin,
    S: Stream<Item = Result<T>> + Unpin,
    P: FnMut(&Error) -> bool + Unpin,
{
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            if this.inner.is_none() {
                this.attempt += 1;
            }
            let inner = this.inner.get_or_insert_with(&mut this.factory);
            match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(Err(error))) => {
                    let retryable = !error.is_cancelled()
                        && this.attempt < this.max_attempts
                        && (this.predicate)(&error);
                    if retryable {
                        tracing::debug!(attempt = this.attempt, %error, "retrying recipe");
                        this.inner = None;
                        continue;
                    }
                    this.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(Ok(item))),
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
