//! Zip combinator.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the [`zip`](super::StreamExt::zip) method.
///
/// Pairs items by arrival index, buffering at most one item from the left
/// side. Completes as soon as either side completes; an unpaired buffered
/// item is discarded.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Zip<S1, S2, F>
where
    S1: Stream,
{
    left: S1,
    right: S2,
    combine: F,
    buffered: Option<S1::Item>,
    done: bool,
}

impl<S1: Stream, S2, F> Zip<S1, S2, F> {
    pub(crate) fn new(left: S1, right: S2, combine: F) -> Self {
        Self {
            left,
            right,
            combine,
            buffered: None,
            done: false,
        }
    }
}

impl<S1, S2, F, U> Stream for Zip<S1, S2, F>
where
    S1: Stream + Unpin,
    S2: Stream + Unpin,
    F: FnMut(S1::Item, S2::Item) -> U + Unpin,
    S1::Item: Unpin,
{
    type Item = U;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        if this.buffered.is_none() {
            match Pin::new(&mut this.left).poll_next(cx) {
                Poll::Ready(Some(item)) => this.buffered = Some(item),
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        match Pin::new(&mut this.right).poll_next(cx) {
            Poll::Ready(Some(right_item)) => {
                let left_item = this
                    .buffered
                    .take()
                    .unwrap_or_else(|| unreachable!("buffered item checked above"));
                Poll::Ready(Some((this.combine)(left_item, right_item)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.buffered = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let (left_lower, left_upper) = self.left.size_hint();
        let (right_lower, right_upper) = self.right.size_hint();
        let buffered = usize::from(self.buffered.is_some());
        let lower = (left_lower + buffered).min(right_lower);
        let upper = match (left_upper, right_upper) {
            (Some(l), Some(r)) => Some((l + buffered).min(r)),
            (Some(l), None) => Some(l + buffered),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        };
        (lower, upper)
    }
}
