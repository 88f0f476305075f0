//! Flattening combinators: strict concatenation and latest-wins.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the [`flat_map_concat`](super::StreamExt::flat_map_concat)
/// method.
///
/// Each inner stream is drained to completion before the next upstream
/// item is consumed, so ordering is strict sequential concatenation.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct FlatMapConcat<S, S2, F> {
    stream: S,
    f: F,
    inner: Option<S2>,
    upstream_done: bool,
}

impl<S, S2, F> FlatMapConcat<S, S2, F> {
    pub(crate) fn new(stream: S, f: F) -> Self {
        Self {
            stream,
            f,
            inner: None,
            upstream_done: false,
        }
    }
}

impl<S, S2, F> Stream for FlatMapConcat<S, S2, F>
where
    S: Stream + Unpin,
    S2: Stream + Unpin,
    F: FnMut(S::Item) -> S2 + Unpin,
{
    type Item = S2::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(inner) = this.inner.as_mut() {
                match Pin::new(inner).poll_next(cx) {
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                    Poll::Ready(None) => this.inner = None,
                    Poll::Pending => return Poll::Pending,
                }
            }
            if this.upstream_done {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.inner = Some((this.f)(item)),
                Poll::Ready(None) => {
                    this.upstream_done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Stream for the [`flat_map_latest`](super::StreamExt::flat_map_latest)
/// method.
///
/// A new upstream item drops the in-flight inner stream (that drop is its
/// cancellation) and starts a fresh inner stream from the latest item, so
/// only the most recent inner stream's emissions reach the consumer.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct FlatMapLatest<S, S2, F> {
    stream: S,
    f: F,
    inner: Option<S2>,
    upstream_done: bool,
}

impl<S, S2, F> FlatMapLatest<S, S2, F> {
    pub(crate) fn new(stream: S, f: F) -> Self {
        Self {
            stream,
            f,
            inner: None,
            upstream_done: false,
        }
    }
}

impl<S, S2, F> Stream for FlatMapLatest<S, S2, F>
where
    S: Stream + Unpin,
    S2: Stream + Unpin,
    F: FnMut(S::Item) -> S2 + Unpin,
{
    type Item = S2::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        // Drain every ready upstream item first; each one supersedes the
        // inner stream started for its predecessor.
        while !this.upstream_done {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => this.inner = Some((this.f)(item)),
                Poll::Ready(None) => this.upstream_done = true,
                Poll::Pending => break,
            }
        }
        if let Some(inner) = this.inner.as_mut() {
            match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => this.inner = None,
                Poll::Pending => return Poll::Pending,
            }
        }
        if this.upstream_done {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
