//! Source streams backed by in-memory values.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Converts an iterator into a stream.
pub fn iter<I: IntoIterator>(into_iter: I) -> Iter<I::IntoIter> {
    Iter {
        iter: into_iter.into_iter(),
    }
}

/// Stream for the [`iter`] function.
#[derive(Debug, Clone)]
#[must_use = "streams do nothing unless polled"]
pub struct Iter<I> {
    iter: I,
}

impl<I: Iterator + Unpin> Stream for Iter<I> {
    type Item = I::Item;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.iter.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// A stream that completes immediately.
#[must_use]
pub fn empty<T>() -> Empty<T> {
    Empty {
        _marker: std::marker::PhantomData,
    }
}

/// Stream for the [`empty`] function.
#[derive(Debug, Clone)]
#[must_use = "streams do nothing unless polled"]
pub struct Empty<T> {
    _marker: std::marker::PhantomData<T>,
}

impl<T> Stream for Empty<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }
}

/// A stream yielding exactly one value.
#[must_use]
pub fn once<T>(value: T) -> Once<T> {
    Once { value: Some(value) }
}

/// Stream for the [`once`] function.
#[derive(Debug, Clone)]
#[must_use = "streams do nothing unless polled"]
pub struct Once<T> {
    value: Option<T>,
}

impl<T: Unpin> Stream for Once<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.value.take())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::from(self.value.is_some());
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker;

    // Sources must be pollable through `Pin<&mut _>` without projection,
    // which requires them to be `Unpin` streams like every combinator
    // expects.
    #[test]
    fn sources_poll_through_a_plain_pin() {
        fn assert_unpin<S: Stream + Unpin>(_: &S) {}

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut items = iter([1, 2]);
        assert_unpin(&items);
        assert_eq!(Pin::new(&mut items).poll_next(&mut cx), Poll::Ready(Some(1)));

        let mut single = once("hi");
        assert_unpin(&single);
        assert_eq!(
            Pin::new(&mut single).poll_next(&mut cx),
            Poll::Ready(Some("hi"))
        );
        assert_eq!(Pin::new(&mut single).poll_next(&mut cx), Poll::Ready(None));

        let mut nothing = empty::<u8>();
        assert_unpin(&nothing);
        assert_eq!(Pin::new(&mut nothing).poll_next(&mut cx), Poll::Ready(None));
    }
}
