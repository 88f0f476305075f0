//! Accumulating terminal operators.

use super::Stream;
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future for the [`fold`](super::StreamExt::fold) method.
///
/// Drains the whole stream into a single accumulated value. An empty
/// stream simply yields the initial value.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Fold<S, B, F> {
    stream: S,
    accumulator: Option<B>,
    f: F,
}

impl<S, B, F> Fold<S, B, F> {
    pub(crate) fn new(stream: S, initial: B, f: F) -> Self {
        Self {
            stream,
            accumulator: Some(initial),
            f,
        }
    }
}

impl<S, B, F> Future for Fold<S, B, F>
where
    S: Stream + Unpin,
    B: Unpin,
    F: FnMut(B, S::Item) -> B + Unpin,
{
    type Output = B;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    let acc = this
                        .accumulator
                        .take()
                        .expect("`Fold` polled after completion");
                    this.accumulator = Some((this.f)(acc, item));
                }
                Poll::Ready(None) => {
                    let acc = this
                        .accumulator
                        .take()
                        .expect("`Fold` polled after completion");
                    return Poll::Ready(acc);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Future for the [`reduce`](super::StreamExt::reduce) method.
///
/// Like `fold` but seeded from the first item; fails with
/// [`Error::EmptySequence`] if the upstream produces nothing.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Reduce<S: Stream, F> {
    stream: S,
    accumulator: Option<S::Item>,
    f: F,
    done: bool,
}

impl<S: Stream, F> Reduce<S, F> {
    pub(crate) fn new(stream: S, f: F) -> Self {
        Self {
            stream,
            accumulator: None,
            f,
            done: false,
        }
    }
}

impl<S, F> Future for Reduce<S, F>
where
    S: Stream + Unpin,
    S::Item: Unpin,
    F: FnMut(S::Item, S::Item) -> S::Item + Unpin,
{
    type Output = Result<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        debug_assert!(!this.done, "`Reduce` polled after completion");
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.accumulator = Some(match this.accumulator.take() {
                        Some(acc) => (this.f)(acc, item),
                        None => item,
                    });
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(this.accumulator.take().ok_or(Error::EmptySequence));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Future for the [`try_fold`](super::StreamExt::try_fold) method.
///
/// Accumulates `Ok` items; the first `Err` item short-circuits.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct TryFold<S, B, F> {
    stream: S,
    accumulator: Option<B>,
    f: F,
}

impl<S, B, F> TryFold<S, B, F> {
    pub(crate) fn new(stream: S, initial: B, f: F) -> Self {
        Self {
            stream,
            accumulator: Some(initial),
            f,
        }
    }
}

impl<S, B, F, T> Future for TryFold<S, B, F>
where
    S: Stream<Item = Result<T>> + Unpin,
    B: Unpin,
    F: FnMut(B, T) -> B + Unpin,
{
    type Output = Result<B>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    let acc = this
                        .accumulator
                        .take()
                        .expect("`TryFold` polled after completion");
                    this.accumulator = Some((this.f)(acc, item));
                }
                Poll::Ready(Some(Err(error))) => {
                    this.accumulator = None;
                    return Poll::Ready(Err(error));
                }
                Poll::Ready(None) => {
                    let acc = this
                        .accumulator
                        .take()
                        .expect("`TryFold` polled after completion");
                    return Poll::Ready(Ok(acc));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
