//! Debounce combinator.

use super::Stream;
use crate::time::{Sleep, Timer};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Stream for the [`debounce`](super::StreamExt::debounce) method.
///
/// Every upstream item arms (or re-arms) a `window`-long timer and becomes
/// the pending item; the pending item is emitted only if the timer fires
/// before a newer item arrives. When the upstream completes, a pending
/// item is flushed immediately before completion propagates.
#[must_use = "streams do nothing unless polled"]
pub struct Debounce<S: Stream> {
    stream: S,
    window: Duration,
    timer: Timer,
    pending: Option<S::Item>,
    sleep: Option<Sleep>,
    upstream_done: bool,
}

impl<S: Stream> Debounce<S> {
    pub(crate) fn new(stream: S, window: Duration, timer: Timer) -> Self {
        Self {
            stream,
            window,
            timer,
            pending: None,
            sleep: None,
            upstream_done: false,
        }
    }
}

impl<S> Stream for Debounce<S>
where
    S: Stream + Unpin,
    S::Item: Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        while !this.upstream_done {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    this.pending = Some(item);
                    this.sleep = Some(this.timer.sleep(this.window));
                }
                Poll::Ready(None) => {
                    this.upstream_done = true;
                    this.sleep = None;
                    // Flush a still-pending item ahead of completion.
                    if let Some(item) = this.pending.take() {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Pending => break,
            }
        }
        if this.upstream_done {
            return Poll::Ready(None);
        }
        if let Some(sleep) = this.sleep.as_mut() {
            match Pin::new(sleep).poll(cx) {
                Poll::Ready(()) => {
                    this.sleep = None;
                    let item = this
                        .pending
                        .take()
                        .expect("armed debounce window without a pending item");
                    return Poll::Ready(Some(item));
                }
                Poll::Pending => {}
            }
        }
        Poll::Pending
    }
}
