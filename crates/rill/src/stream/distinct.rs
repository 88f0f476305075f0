//! Adjacent-duplicate suppression.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the
/// [`distinct_until_changed`](super::StreamExt::distinct_until_changed)
/// method.
///
/// The first item always passes; afterwards an item equal to the
/// immediately preceding emission is dropped. The output is always a
/// subsequence of the input with no two adjacent equal elements.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct DistinctUntilChanged<S: Stream> {
    stream: S,
    last: Option<S::Item>,
}

impl<S: Stream> DistinctUntilChanged<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self { stream, last: None }
    }
}

impl<S> Stream for DistinctUntilChanged<S>
where
    S: Stream + Unpin,
    S::Item: Clone + PartialEq + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if this.last.as_ref() == Some(&item) {
                        continue;
                    }
                    this.last = Some(item.clone());
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (_, upper) = self.stream.size_hint();
        (0, upper)
    }
}
