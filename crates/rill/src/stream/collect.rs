//! Draining terminal operators.

use super::Stream;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future for the [`collect`](super::StreamExt::collect) /
/// [`to_list`](super::StreamExt::to_list) methods.
///
/// Drains the stream into an ordered `Vec`; an empty stream yields an
/// empty `Vec`.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Collect<S: Stream> {
    stream: S,
    items: Vec<S::Item>,
}

impl<S: Stream> Collect<S> {
    pub(crate) fn new(stream: S) -> Self {
        let capacity = stream.size_hint().0;
        Self {
            stream,
            items: Vec::with_capacity(capacity),
        }
    }
}

impl<S> Future for Collect<S>
where
    S: Stream + Unpin,
    S::Item: Unpin,
{
    type Output = Vec<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.items.push(item),
                Poll::Ready(None) => return Poll::Ready(std::mem::take(&mut this.items)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Future for the [`try_collect`](super::StreamExt::try_collect) method.
///
/// Drains `Ok` items into a `Vec`; the first `Err` item short-circuits.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct TryCollect<S, T> {
    stream: S,
    items: Vec<T>,
}

impl<S, T> TryCollect<S, T>
where
    S: Stream<Item = Result<T>>,
{
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            items: Vec::new(),
        }
    }
}

impl<S, T> Future for TryCollect<S, T>
where
    S: Stream<Item = Result<T>> + Unpin,
    T: Unpin,
{
    type Output = Result<Vec<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => this.items.push(item),
                Poll::Ready(Some(Err(error))) => {
                    this.items.clear();
                    return Poll::Ready(Err(error));
                }
                Poll::Ready(None) => return Poll::Ready(Ok(std::mem::take(&mut this.items))),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
