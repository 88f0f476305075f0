//! Take combinator.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the [`take`](super::StreamExt::take) method.
///
/// Once `n` items have been delivered the upstream is dropped, which is
/// the cancellation path for a pull-driven producer: nothing polls it
/// again and any resources it held are released.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Take<S> {
    stream: Option<S>,
    remaining: usize,
}

impl<S> Take<S> {
    pub(crate) fn new(stream: S, remaining: usize) -> Self {
        // `take(0)` never polls the upstream at all.
        Self {
            stream: (remaining > 0).then_some(stream),
            remaining,
        }
    }
}

impl<S: Stream + Unpin> Stream for Take<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.remaining -= 1;
                if this.remaining == 0 {
                    this.stream = None;
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.remaining = 0;
                this.stream = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }
        let (lower, upper) = self
            .stream
            .as_ref()
            .map_or((0, Some(0)), Stream::size_hint);
        let lower = lower.min(self.remaining);
        let upper = upper.map_or(Some(self.remaining), |x| Some(x.min(self.remaining)));
        (lower, upper)
    }
}
